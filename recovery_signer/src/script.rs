//! Builds the two-of-two output script for each of the four script
//! versions the wallet has produced addresses under.
//!
//! The underlying spending policy is the same 2-of-2 multisig in every
//! version; what changed release over release was the wrapping: legacy
//! P2SH, nested segwit, then native segwit. V5 reuses V4's native P2WSH
//! wrapping — this factory does not attempt to reconstruct the real
//! wallet's later timelocked-recovery script variants, since script
//! construction is an external collaborator the core only consumes
//! through this interface.

use bitcoin::blockdata::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_2};
use bitcoin::blockdata::script::Builder;
use bitcoin::{Address, Network, PublicKey, ScriptBuf};
use recovery_common::{Error, MuunAddress, ScriptFactory, ScriptVersion};

pub struct MultisigScriptFactory {
    network: Network,
}

impl MultisigScriptFactory {
    pub fn new(network: Network) -> Self {
        Self { network }
    }
}

impl Default for MultisigScriptFactory {
    fn default() -> Self {
        Self::new(Network::Bitcoin)
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

impl ScriptFactory for MultisigScriptFactory {
    fn build(
        &self,
        version: ScriptVersion,
        derivation_path: &str,
        user_pubkey: &PublicKey,
        cosigner_pubkey: &PublicKey,
    ) -> Result<MuunAddress, Error> {
        let redeem = witness_script(user_pubkey, cosigner_pubkey);

        let address = match version {
            ScriptVersion::V2 => Address::p2sh(&redeem, self.network)
                .map_err(|e| Error::BadAddress(e.to_string()))?,
            ScriptVersion::V3 => Address::p2shwsh(&redeem, self.network),
            ScriptVersion::V4 | ScriptVersion::V5 => Address::p2wsh(&redeem, self.network),
        };

        Ok(MuunAddress {
            encoded: address.to_string(),
            script: address.script_pubkey(),
            derivation_path: derivation_path.to_string(),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};

    fn sample_pubkeys() -> (PublicKey, PublicKey) {
        let secp = Secp256k1::new();
        let a = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let b = SecretKey::from_slice(&[2u8; 32]).unwrap();
        (
            PublicKey::new(SecpPublicKey::from_secret_key(&secp, &a)),
            PublicKey::new(SecpPublicKey::from_secret_key(&secp, &b)),
        )
    }

    #[test]
    fn every_version_builds_a_distinct_encoding_except_v4_v5() {
        let factory = MultisigScriptFactory::default();
        let (user, cosigner) = sample_pubkeys();

        let mut seen = std::collections::HashSet::new();
        for version in ScriptVersion::ALL {
            let addr = factory.build(version, "m/1'/1'/0/0", &user, &cosigner).unwrap();
            seen.insert(addr.encoded);
        }
        // V4 and V5 coincide by construction; the other two are distinct.
        assert_eq!(seen.len(), 3);
    }
}
