//! Scanner: walks the address space, in batches, querying the indexer pool
//! for unspent outputs.
//!
//! Concurrency here is the pool's affair, not a fixed worker count: each
//! batch is a task that checks out one pooled client, uses it, and releases
//! it; however many batches can run at once is exactly however many clients
//! the pool is willing to hand out. A batch that blows its timeout budget
//! is retried once against a different server before it's treated as a
//! fatal scan error.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use recovery_common::{MuunAddress, Utxo};
use tracing::{info, warn};

use crate::error::Error;
use crate::indexer::{Pool, ServerProvider};

/// Incremental feedback from a running scan. Progress is reported against
/// the Address Generator's emission order (change, then external, then
/// contacts; ascending index; V2..V5), so a caller can show something more
/// meaningful than a raw counter.
#[derive(Debug, Clone)]
pub struct Report {
    pub addresses_scanned: usize,
    pub utxos_found: usize,
}

pub struct Scanner {
    pool: Arc<Pool>,
    servers: Arc<ServerProvider>,
    batch_size: usize,
    task_timeout: Duration,
}

impl Scanner {
    pub fn new(pool: Arc<Pool>, servers: Arc<ServerProvider>, batch_size: usize, task_timeout: Duration) -> Self {
        Self {
            pool,
            servers,
            batch_size,
            task_timeout,
        }
    }

    /// Consumes the address stream, returning every distinct UTXO found.
    /// `on_progress` is called from the calling thread after each batch
    /// completes (never concurrently, so it's safe for a caller to update
    /// a terminal spinner or counter from it without locking).
    pub fn scan(
        &self,
        addresses: impl Iterator<Item = MuunAddress>,
        mut on_progress: impl FnMut(&Report),
    ) -> Result<Vec<Utxo>, Error> {
        let (result_tx, result_rx) = mpsc::channel::<Result<(usize, Vec<Utxo>), Error>>();

        let mut in_flight = 0usize;
        let mut seen = HashSet::new();
        let mut utxos = Vec::new();
        let mut addresses_scanned = 0usize;
        let mut batches = batch_addresses(addresses, self.batch_size).peekable();

        // A simple bounded-fan-out loop: keep up to `pool.capacity()` batch
        // tasks in flight, collecting results as they land and starting a
        // new one each time a slot frees up.
        let capacity = self.pool.capacity().max(1);

        loop {
            while in_flight < capacity && batches.peek().is_some() {
                let batch = batches.next().unwrap();
                in_flight += 1;
                self.spawn_batch_task(batch, result_tx.clone());
            }

            if in_flight == 0 {
                break;
            }

            match result_rx.recv() {
                Ok(Ok((batch_len, batch_utxos))) => {
                    in_flight -= 1;
                    addresses_scanned += batch_len;
                    for utxo in batch_utxos {
                        if seen.insert(utxo.outpoint_key()) {
                            utxos.push(utxo);
                        }
                    }
                    let report = Report {
                        addresses_scanned,
                        utxos_found: utxos.len(),
                    };
                    on_progress(&report);
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "scan aborting: batch failed twice");
                    return Err(e);
                }
                Err(_) => break,
            }
        }

        info!(addresses_scanned, utxos_found = utxos.len(), "scan complete");
        Ok(utxos)
    }

    fn spawn_batch_task(&self, batch: Vec<MuunAddress>, result_tx: mpsc::Sender<Result<(usize, Vec<Utxo>), Error>>) {
        let pool = self.pool.clone();
        let servers = self.servers.clone();
        let timeout = self.task_timeout;

        thread::spawn(move || {
            let batch_len = batch.len();
            let result = run_batch_with_retry(&pool, &servers, &batch, timeout).map(|utxos| (batch_len, utxos));
            let _ = result_tx.send(result);
        });
    }
}

fn run_batch_with_retry(
    pool: &Pool,
    servers: &ServerProvider,
    batch: &[MuunAddress],
    timeout: Duration,
) -> Result<Vec<Utxo>, Error> {
    match run_batch_once(pool, batch, timeout) {
        Ok(utxos) => Ok(utxos),
        Err(first_err) => {
            warn!(error = %first_err, "batch task failed, retrying against another server");
            // The failing client is already gone from the pool (discarded
            // by run_batch_once); acquiring again naturally rotates.
            let _ = servers.next_server();
            run_batch_once(pool, batch, timeout)
        }
    }
}

fn run_batch_once(pool: &Pool, batch: &[MuunAddress], timeout: Duration) -> Result<Vec<Utxo>, Error> {
    let start = Instant::now();
    let mut client = pool.acquire()?;

    let index_hashes: Vec<String> = batch.iter().map(|a| a.index_hash().to_hex()).collect();

    let result = if client.supports_batching() {
        client.list_unspent_batch(&index_hashes)
    } else {
        index_hashes
            .iter()
            .map(|h| client.list_unspent(h))
            .collect::<Result<Vec<_>, _>>()
    };

    if start.elapsed() > timeout {
        client.discard();
        return Err(Error::Timeout {
            server: "unknown".to_string(),
            method: "scan_batch",
            elapsed_ms: start.elapsed().as_millis(),
        });
    }

    let rows = match result {
        Ok(rows) => rows,
        Err(e) => {
            client.discard();
            return Err(e);
        }
    };

    let mut utxos = Vec::new();
    for (address, unspent_refs) in batch.iter().zip(rows.into_iter()) {
        for u in unspent_refs {
            let tx_id = match u.tx_hash.parse() {
                Ok(id) => id,
                Err(_) => continue,
            };
            match Utxo::new(tx_id, u.tx_pos, u.value, address.clone()) {
                Ok(utxo) => utxos.push(utxo),
                Err(e) => warn!(%e, "dropping malformed utxo from indexer response"),
            }
        }
    }

    Ok(utxos)
}

/// Wraps the address stream into a lazy iterator of fixed-size batches: each
/// batch is pulled from the underlying generator only when the fan-out loop
/// asks for one, so the full address space (tens of thousands of entries) is
/// never materialized at once.
struct BatchIter<I> {
    inner: I,
    batch_size: usize,
}

impl<I: Iterator<Item = MuunAddress>> Iterator for BatchIter<I> {
    type Item = Vec<MuunAddress>;

    fn next(&mut self) -> Option<Vec<MuunAddress>> {
        let batch: Vec<MuunAddress> = self.inner.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

fn batch_addresses(
    addresses: impl Iterator<Item = MuunAddress>,
    batch_size: usize,
) -> impl Iterator<Item = Vec<MuunAddress>> {
    BatchIter { inner: addresses, batch_size }
}
