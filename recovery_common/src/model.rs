use std::fmt;

use bitcoin::{ScriptBuf, Txid};
#[cfg(test)]
use bitcoin::hashes::Hash as _;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// The four output-script flavours the wallet may have derived addresses
/// under over its lifetime. Newer versions are attempted before older ones
/// are assumed, but generation walks all four for every index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptVersion {
    V2,
    V3,
    V4,
    V5,
}

impl ScriptVersion {
    /// All versions, oldest first — the order addresses are generated in
    /// for a given derivation index.
    pub const ALL: [ScriptVersion; 4] = [
        ScriptVersion::V2,
        ScriptVersion::V3,
        ScriptVersion::V4,
        ScriptVersion::V5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptVersion::V2 => "V2",
            ScriptVersion::V3 => "V3",
            ScriptVersion::V4 => "V4",
            ScriptVersion::V5 => "V5",
        }
    }
}

impl fmt::Display for ScriptVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived wallet address, paired with the output script an indexer
/// query and a sweep both need, and the path it was derived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuunAddress {
    pub encoded: String,
    pub script: ScriptBuf,
    pub derivation_path: String,
    pub version: ScriptVersion,
}

impl MuunAddress {
    pub fn index_hash(&self) -> IndexHash {
        IndexHash::compute(&self.script)
    }
}

/// A confirmed or unconfirmed output found to belong to one of our derived
/// addresses. Identity for dedup purposes is `(tx_id, output_index)` only —
/// two reports of the same outpoint from different servers must collapse to
/// one entry regardless of amount or address bookkeeping differences.
#[derive(Debug, Clone)]
pub struct Utxo {
    pub tx_id: Txid,
    pub output_index: u32,
    pub amount_sats: i64,
    pub address: MuunAddress,
}

impl Utxo {
    pub fn new(
        tx_id: Txid,
        output_index: u32,
        amount_sats: i64,
        address: MuunAddress,
    ) -> Result<Self, Error> {
        if amount_sats <= 0 {
            return Err(Error::Other(format!(
                "utxo {tx_id}:{output_index} has non-positive amount {amount_sats}"
            )));
        }
        Ok(Self {
            tx_id,
            output_index,
            amount_sats,
            address,
        })
    }

    /// The `(tx_id, output_index)` pair used as the dedup key across
    /// servers and across scan passes.
    pub fn outpoint_key(&self) -> (Txid, u32) {
        (self.tx_id, self.output_index)
    }
}

impl PartialEq for Utxo {
    fn eq(&self, other: &Self) -> bool {
        self.outpoint_key() == other.outpoint_key()
    }
}
impl Eq for Utxo {}

impl std::hash::Hash for Utxo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.outpoint_key().hash(state);
    }
}

/// Reversed-byte-order hex SHA-256 of an output script, used by the
/// indexer's `blockchain.scripthash.*` family in place of the raw script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexHash([u8; 32]);

impl IndexHash {
    pub fn compute(script: &ScriptBuf) -> Self {
        let digest = Sha256::digest(script.as_bytes());
        let mut bytes: [u8; 32] = digest.into();
        bytes.reverse();
        IndexHash(bytes)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Reconstructs from the hex form the indexer hands back, for tests
    /// and for round-tripping server responses.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let bytes = hex::decode(s).map_err(|e| Error::Other(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(Error::BadKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(IndexHash(arr))
    }
}

impl fmt::Display for IndexHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_hash_is_pure_and_deterministic() {
        let script = ScriptBuf::from_hex("76a914000000000000000000000000000000000000000088ac")
            .unwrap();
        let a = IndexHash::compute(&script);
        let b = IndexHash::compute(&script);
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn index_hash_round_trips_through_hex() {
        let script = ScriptBuf::from_hex("0014000000000000000000000000000000000000000000").unwrap();
        let h = IndexHash::compute(&script);
        let back = IndexHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn utxo_equality_ignores_amount_and_address() {
        let addr = MuunAddress {
            encoded: "bc1q...".into(),
            script: ScriptBuf::new(),
            derivation_path: "m/1'/1'/0".into(),
            version: ScriptVersion::V5,
        };
        let txid = bitcoin::Txid::from_raw_hash(bitcoin::hashes::sha256d::Hash::all_zeros());
        let a = Utxo::new(txid, 0, 1000, addr.clone()).unwrap();
        let b = Utxo::new(txid, 0, 9999, addr).unwrap();
        assert_eq!(a, b);
    }
}
