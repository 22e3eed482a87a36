//! Two-party ECDSA `Signer`: for every input, re-derives the user and
//! cosigner child keys the address was generated under, rebuilds the
//! 2-of-2 witness script, and produces both signatures.
//!
//! A real two-party wallet would get the cosigner's half of the signature
//! from a remote call to the cosigning server; here, since `recovery_core`
//! treats `Signer` as a single opaque collaborator (see
//! `recovery_common::contracts::Signer`), both halves are produced locally
//! from keys the caller already holds after backup decryption.

use bitcoin::blockdata::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_2};
use bitcoin::blockdata::script::Builder;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Amount, PublicKey, ScriptBuf, Transaction, Witness};
use recovery_common::{Error, HdPrivateKey, ScriptVersion, Signer, Utxo};

use crate::error::SignError;
use crate::hd::Bip32HdPrivateKey;

pub struct MultisigSigner;

impl MultisigSigner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MultisigSigner {
    fn default() -> Self {
        Self::new()
    }
}

fn witness_script(user_pubkey: &PublicKey, cosigner_pubkey: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_PUSHNUM_2)
        .push_key(user_pubkey)
        .push_key(cosigner_pubkey)
        .push_opcode(OP_PUSHNUM_2)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

fn downcast(key: &dyn HdPrivateKey) -> Result<&Bip32HdPrivateKey, SignError> {
    key.as_any()
        .downcast_ref::<Bip32HdPrivateKey>()
        .ok_or(SignError::UnsupportedKeyType)
}

impl Signer for MultisigSigner {
    fn sign(
        &self,
        unsigned_tx: &Transaction,
        spent_utxos: &[Utxo],
        user_key: &dyn HdPrivateKey,
        cosigner_key: &dyn HdPrivateKey,
    ) -> Result<Transaction, Error> {
        Ok(self.sign_inner(unsigned_tx, spent_utxos, user_key, cosigner_key)?)
    }
}

impl MultisigSigner {
    fn sign_inner(
        &self,
        unsigned_tx: &Transaction,
        spent_utxos: &[Utxo],
        user_key: &dyn HdPrivateKey,
        cosigner_key: &dyn HdPrivateKey,
    ) -> Result<Transaction, SignError> {
        let user_root = downcast(user_key)?;
        let cosigner_root = downcast(cosigner_key)?;
        let secp = Secp256k1::new();

        let mut tx = unsigned_tx.clone();
        let prevouts: Vec<Amount> = spent_utxos
            .iter()
            .map(|u| Amount::from_sat(u.amount_sats.max(0) as u64))
            .collect();

        for (index, utxo) in spent_utxos.iter().enumerate() {
            if utxo.address.version == ScriptVersion::V2 {
                return Err(SignError::LegacyUnsupported);
            }

            let path = utxo.address.derivation_path.parse::<bitcoin::bip32::DerivationPath>()?;
            let user_child = user_root.xpriv().derive_priv(&secp, &path)?;
            let cosigner_child = cosigner_root.xpriv().derive_priv(&secp, &path)?;

            let user_pub = PublicKey::from_private_key(&secp, &user_child.to_priv());
            let cosigner_pub = PublicKey::from_private_key(&secp, &cosigner_child.to_priv());
            let redeem = witness_script(&user_pub, &cosigner_pub);

            let mut cache = SighashCache::new(&tx);
            let sighash = cache
                .p2wsh_signature_hash(index, &redeem, prevouts[index], EcdsaSighashType::All)
                .map_err(|e| SignError::Sighash(e.to_string()))?;
            let message = Message::from_digest(sighash.to_byte_array());

            let user_sig = sign_ecdsa(&secp, &message, &user_child, EcdsaSighashType::All);
            let cosigner_sig = sign_ecdsa(&secp, &message, &cosigner_child, EcdsaSighashType::All);

            let mut witness = Witness::new();
            witness.push(Vec::new()); // CHECKMULTISIG off-by-one dummy element
            witness.push(user_sig.to_vec());
            witness.push(cosigner_sig.to_vec());
            witness.push(redeem.to_bytes());

            if utxo.address.version == ScriptVersion::V3 {
                let witness_program = ScriptBuf::new_p2wsh(&redeem.wscript_hash());
                tx.input[index].script_sig = Builder::new().push_slice(witness_program.as_bytes()).into_script();
            }
            tx.input[index].witness = witness;
        }

        Ok(tx)
    }
}

fn sign_ecdsa(
    secp: &Secp256k1<bitcoin::secp256k1::All>,
    message: &Message,
    child: &bitcoin::bip32::Xpriv,
    sighash_type: EcdsaSighashType,
) -> Vec<u8> {
    let sig = secp.sign_ecdsa(message, &child.private_key);
    let mut bytes = sig.serialize_der().to_vec();
    bytes.push(sighash_type.to_u32() as u8);
    bytes
}
