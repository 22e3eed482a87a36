//! Sweeper: turns a discovered UTXO set into one signed, broadcast
//! transaction paying everything found to a single destination.
//!
//! There is deliberately no coin selection and no change output — every
//! UTXO found goes in, exactly one output comes out. This is sweep
//! semantics, not wallet-transaction semantics, and future work on this
//! module should not try to add either back.

use std::sync::Arc;

use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use recovery_common::{HdPrivateKey, Signer, Utxo};
use tracing::{info, warn};

use crate::error::Error;
use crate::indexer::{Pool, ServerProvider};

/// Electrum-protocol dust threshold: outputs below this are non-standard
/// and most servers will refuse to relay them.
pub const DUST_THRESHOLD_SATS: i64 = 546;

pub struct Sweeper<'a> {
    pool: Arc<Pool>,
    servers: Arc<ServerProvider>,
    signer: &'a dyn Signer,
}

impl<'a> Sweeper<'a> {
    pub fn new(pool: Arc<Pool>, servers: Arc<ServerProvider>, signer: &'a dyn Signer) -> Self {
        Self { pool, servers, signer }
    }

    /// Step 1 of the algorithm: builds and fully signs a zero-fee version
    /// of the sweep transaction purely to measure its serialized size. The
    /// signature itself is discarded; only `W` (bytes) is kept.
    pub fn probe_size(
        &self,
        utxos: &[Utxo],
        destination: &ScriptBuf,
        user_key: &dyn HdPrivateKey,
        cosigner_key: &dyn HdPrivateKey,
    ) -> Result<u64, Error> {
        let total: i64 = utxos.iter().map(|u| u.amount_sats).sum();
        let skeleton = build_skeleton(utxos, destination, total);
        let signed = self.signer.sign(&skeleton, utxos, user_key, cosigner_key)?;
        Ok(signed.total_size() as u64)
    }

    /// Step 2: given the measured size and a sats/byte rate, computes the
    /// final output amount, rejecting anything that would leave the single
    /// output below the dust threshold.
    pub fn compute_output_value(total_sats: i64, rate_sats_per_byte: u64, size_bytes: u64) -> Result<i64, Error> {
        let fee = rate_sats_per_byte
            .checked_mul(size_bytes)
            .ok_or_else(|| Error::Build("fee overflow".to_string()))? as i64;
        let value = total_sats - fee;
        if value < DUST_THRESHOLD_SATS {
            return Err(Error::Build(format!(
                "sweep output {value} sats is below dust threshold {DUST_THRESHOLD_SATS} (fee {fee} on {total_sats} total)"
            )));
        }
        Ok(value)
    }

    /// Steps 3-4: builds the final transaction at `value`, signs it, then
    /// broadcasts it, rotating through the Server Provider if the first
    /// server to try rejects or drops the connection.
    pub fn sweep(
        &self,
        utxos: &[Utxo],
        destination: &ScriptBuf,
        value_sats: i64,
        user_key: &dyn HdPrivateKey,
        cosigner_key: &dyn HdPrivateKey,
    ) -> Result<Txid, Error> {
        let skeleton = build_skeleton(utxos, destination, value_sats);
        let signed = self.signer.sign(&skeleton, utxos, user_key, cosigner_key)?;
        let raw_hex = bitcoin::consensus::encode::serialize_hex(&signed);

        self.broadcast_with_rotation(&raw_hex, signed.compute_txid())
    }

    fn broadcast_with_rotation(&self, raw_hex: &str, expected_txid: Txid) -> Result<Txid, Error> {
        let attempts = self.servers.len().max(1);
        let mut last_err = None;

        for _ in 0..attempts {
            match self.pool.acquire() {
                Ok(mut client) => match client.broadcast(raw_hex) {
                    Ok(returned) => {
                        info!(txid = %expected_txid, server = client.server(), "broadcast accepted");
                        let _ = returned;
                        return Ok(expected_txid);
                    }
                    Err(e) => {
                        warn!(error = %e, server = client.server(), "broadcast rejected, rotating");
                        client.discard();
                        last_err = Some(e);
                    }
                },
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or(Error::Broadcast {
            raw_tx_hex: raw_hex.to_string(),
            message: "no server available".to_string(),
        }))
    }
}

fn build_skeleton(utxos: &[Utxo], destination: &ScriptBuf, value_sats: i64) -> Transaction {
    let inputs = utxos
        .iter()
        .map(|u| TxIn {
            previous_output: OutPoint::new(u.tx_id, u.output_index),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        })
        .collect();

    Transaction {
        version: bitcoin::transaction::Version::TWO,
        lock_time: bitcoin::absolute::LockTime::ZERO,
        input: inputs,
        output: vec![TxOut {
            value: Amount::from_sat(value_sats.max(0) as u64),
            script_pubkey: destination.clone(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dust_threshold_rejects_low_value_output() {
        let err = Sweeper::compute_output_value(600, 10, 120).unwrap_err();
        assert!(err.to_string().contains("dust"));
    }

    #[test]
    fn fee_safety_holds_for_accepted_outputs() {
        let total = 50_000;
        let rate = 2u64;
        let size = 226u64;
        let value = Sweeper::compute_output_value(total, rate, size).unwrap();
        assert!(total - value as i64 == (rate * size) as i64);
        assert!(value >= DUST_THRESHOLD_SATS);
    }
}
