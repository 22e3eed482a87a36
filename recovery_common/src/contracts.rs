//! Interfaces the recovery pipeline is built against, but does not itself
//! implement. Concrete implementations live in `recovery_signer` (for
//! `HdPrivateKey`, `ScriptFactory`, `Signer`, `KeyVault`) and `recovery_cli`
//! (for `BackupReader`).

use bitcoin::PublicKey;

use crate::error::Error;
use crate::model::{MuunAddress, ScriptVersion, Utxo};

/// A single node in an HD key tree. Implementations wrap either the user's
/// or the cosigning server's extended key; the pipeline never distinguishes
/// between the two beyond the derivation paths it asks for.
pub trait HdPrivateKey: Send + Sync {
    /// Derives the node reachable by `path` (e.g. `"m/1'/1'/0"`) from this
    /// node, which must itself be the root.
    fn derive_to(&self, path: &str) -> Result<Box<dyn HdPrivateKey>, Error>;

    /// Derives a single child index from this node.
    fn derived_at(&self, index: u32, hardened: bool) -> Result<Box<dyn HdPrivateKey>, Error>;

    fn public_key(&self) -> PublicKey;

    /// Lets a concrete `Signer` recover its own key type from the trait
    /// object the core hands it — the core only ever sees the opaque
    /// interface above, but a real signer needs the private scalar to
    /// actually produce a signature.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Builds the two-of-two output script for a given script version from the
/// user and cosigner public keys at a matching derivation index.
pub trait ScriptFactory: Send + Sync {
    fn build(
        &self,
        version: ScriptVersion,
        derivation_path: &str,
        user_pubkey: &PublicKey,
        cosigner_pubkey: &PublicKey,
    ) -> Result<MuunAddress, Error>;
}

/// Produces a fully signed transaction from a skeleton and the UTXOs it
/// spends. A two-of-two wallet needs both the user's and the cosigning
/// server's key to finish a signature; how that second signature is
/// obtained (local key, remote call) is the implementation's business.
pub trait Signer: Send + Sync {
    fn sign(
        &self,
        unsigned_tx: &bitcoin::Transaction,
        spent_utxos: &[Utxo],
        user_key: &dyn HdPrivateKey,
        cosigner_key: &dyn HdPrivateKey,
    ) -> Result<bitcoin::Transaction, Error>;
}

/// Turns a recovery code and an encrypted key blob into a usable HD key.
pub trait KeyVault {
    fn decrypt(
        &self,
        recovery_code: &str,
        encrypted_key: &str,
    ) -> Result<Box<dyn HdPrivateKey>, Error>;
}

/// The encrypted key material and metadata a backup file yields, before
/// decryption.
#[derive(Debug, Clone)]
pub struct BackupContents {
    pub encrypted_user_key: String,
    pub encrypted_cosigner_key: String,
    /// Wallet creation height hint; `0xFFFF` historically meant "unknown,
    /// scan from genesis" and is kept only as an informational sentinel.
    pub birthday: u32,
}

pub trait BackupReader {
    fn read(&self) -> Result<BackupContents, Error>;
}
