//! Concrete implementations of the `HdPrivateKey`, `ScriptFactory`,
//! `Signer` and `KeyVault` contracts `recovery_core` is built against.

pub mod error;
pub mod hd;
pub mod script;
pub mod signer;
pub mod vault;

pub use error::{SignError, VaultError};
pub use hd::Bip32HdPrivateKey;
pub use script::MultisigScriptFactory;
pub use signer::MultisigSigner;
pub use vault::MuunKeyVault;
