//! Server Survey: an offline crawl-and-rank tool, run separately from the
//! recovery flow, that feeds a fresh [`crate::indexer::provider::PUBLIC_SERVERS`]
//! list. It is not part of the interactive recovery pipeline — it exists so
//! that list can be refreshed periodically against the live Electrum fleet.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::RngCore;
use tracing::warn;

use crate::indexer::client::Client;

const MAINNET_GENESIS_HASH: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
const MAINNET_KNOWN_TX: &str = "985eb411473fa1bbd73efa5e3685edc00366c86b8d4d3f5b969ad59c23f4d959";

#[derive(Debug, Clone)]
pub struct SurveyConfig {
    pub initial_servers: Vec<String>,
    pub workers: usize,
    pub speed_test_duration: Duration,
    pub speed_test_batch_size: usize,
}

impl SurveyConfig {
    pub fn with_defaults(initial_servers: Vec<String>) -> Self {
        Self {
            initial_servers,
            workers: 30,
            speed_test_duration: Duration::from_secs(20),
            speed_test_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurveyResult {
    pub server: String,
    pub from_peer: Option<String>,
    pub is_worthy: bool,
    pub error: Option<String>,
    pub server_impl: String,
    pub proto_version: String,
    pub time_to_connect: Duration,
    pub batch_support: bool,
    pub speed: usize,
}

impl SurveyResult {
    fn failed(server: String, from_peer: Option<String>, error: String) -> Self {
        Self {
            server,
            from_peer,
            is_worthy: false,
            error: Some(error),
            server_impl: String::new(),
            proto_version: String::new(),
            time_to_connect: Duration::ZERO,
            batch_support: false,
            speed: 0,
        }
    }

    /// Ranking order: errored servers sort last; among the rest, worthy
    /// beats unworthy, batching beats no batching, higher throughput beats
    /// lower, and lower connect latency breaks remaining ties.
    fn is_better_than(&self, other: &SurveyResult) -> bool {
        if self.error.is_some() {
            return false;
        }
        if other.error.is_some() {
            return true;
        }
        if self.is_worthy != other.is_worthy {
            return self.is_worthy;
        }
        if self.batch_support != other.batch_support {
            return self.batch_support;
        }
        if self.speed != other.speed {
            return self.speed > other.speed;
        }
        self.time_to_connect < other.time_to_connect
    }
}

struct Task {
    server: String,
    from_peer: Option<String>,
}

struct ProbeOutcome {
    result: SurveyResult,
    peers: Vec<String>,
}

/// Crawls outward from `config.initial_servers` via each server's peer
/// list, probing each one visited exactly once, and returns results sorted
/// best-first.
pub struct Survey {
    config: SurveyConfig,
}

impl Survey {
    pub fn new(config: SurveyConfig) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Vec<SurveyResult> {
        let (task_tx, task_rx) = mpsc::channel::<Task>();
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, result_rx) = mpsc::channel::<SurveyResult>();

        let visited = Arc::new(Mutex::new(HashSet::new()));
        let pending = Arc::new(Mutex::new(0usize));

        let enqueue = {
            let visited = visited.clone();
            let pending = pending.clone();
            let task_tx = task_tx.clone();
            move |server: String, from_peer: Option<String>| {
                let mut visited = visited.lock().expect("poisoned");
                if !visited.insert(server.clone()) {
                    return;
                }
                drop(visited);
                *pending.lock().expect("poisoned") += 1;
                let _ = task_tx.send(Task { server, from_peer });
            }
        };

        for server in &self.config.initial_servers {
            enqueue(server.clone(), None);
        }

        let mut handles = Vec::new();
        for _ in 0..self.config.workers.max(1) {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let pending = pending.clone();
            let enqueue = enqueue.clone();
            let speed_test_duration = self.config.speed_test_duration;
            let speed_test_batch_size = self.config.speed_test_batch_size;

            handles.push(thread::spawn(move || loop {
                let task = {
                    let rx = task_rx.lock().expect("poisoned");
                    rx.recv_timeout(Duration::from_millis(200))
                };
                let task = match task {
                    Ok(task) => task,
                    Err(_) => {
                        if *pending.lock().expect("poisoned") == 0 {
                            break;
                        }
                        continue;
                    }
                };

                let server = task.server.clone();
                let outcome = probe(task, speed_test_duration, speed_test_batch_size);

                for peer in outcome.peers {
                    if peer.contains(".onion:") {
                        continue;
                    }
                    enqueue(peer, Some(server.clone()));
                }

                let _ = result_tx.send(outcome.result);
                *pending.lock().expect("poisoned") -= 1;
            }));
        }

        drop(task_tx);
        drop(result_tx);

        let mut results = Vec::new();
        while let Ok(result) = result_rx.recv() {
            results.push(result);
        }

        for h in handles {
            let _ = h.join();
        }

        results.sort_by(|a, b| {
            if a.is_better_than(b) {
                std::cmp::Ordering::Less
            } else if b.is_better_than(a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });

        results
    }
}

/// Formats the results as two annotated blocks of Rust array literals: a
/// "worthy" list ready to paste into
/// [`crate::indexer::provider::PUBLIC_SERVERS`], and an "unworthy" list kept
/// for visibility into why candidates were dropped.
pub fn render_source(results: &[SurveyResult]) -> String {
    let mut out = String::new();
    out.push_str("// Worthy servers:\n");
    for r in results.iter().filter(|r| r.is_worthy) {
        out.push_str(&format!(
            "\"{}\", // impl: {}, batching: {}, ttc: {:.2}, speed: {}, from: {}\n",
            r.server,
            r.server_impl,
            r.batch_support,
            r.time_to_connect.as_secs_f64(),
            r.speed,
            r.from_peer.as_deref().unwrap_or(""),
        ));
    }
    out.push_str("\n// Unworthy servers:\n");
    for r in results.iter().filter(|r| !r.is_worthy) {
        match &r.error {
            Some(e) => out.push_str(&format!("\"{}\", // {}\n", r.server, e)),
            None => out.push_str(&format!(
                "\"{}\", // impl: {}, batching: {}, ttc: {:.2}, speed: {}, from: {}\n",
                r.server,
                r.server_impl,
                r.batch_support,
                r.time_to_connect.as_secs_f64(),
                r.speed,
                r.from_peer.as_deref().unwrap_or(""),
            )),
        }
    }
    out
}

/// Runs all five probes against one server: connect, mainnet check, batch
/// support, throughput, and peer listing. Each reconnects rather than
/// reusing a socket, since a server that errors on one request sometimes
/// just closes the connection outright.
fn probe(task: Task, speed_test_duration: Duration, speed_test_batch_size: usize) -> ProbeOutcome {
    let connect_timeout = Duration::from_secs(10);
    let call_timeout = Duration::from_secs(10);

    macro_rules! fail {
        ($e:expr) => {
            return ProbeOutcome {
                result: SurveyResult::failed(task.server.clone(), task.from_peer.clone(), $e),
                peers: Vec::new(),
            }
        };
    }

    let start = Instant::now();
    let mut client = Client::new(true, connect_timeout, call_timeout, call_timeout * 2);
    if let Err(e) = client.connect(&task.server) {
        fail!(e.to_string());
    }
    let time_to_connect = start.elapsed();
    let server_impl = client.server_impl().to_string();

    let features = match client.server_features() {
        Ok(f) => f,
        Err(e) => fail!(e.to_string()),
    };
    if features.genesis_hash != MAINNET_GENESIS_HASH {
        fail!("not on Bitcoin mainnet".to_string());
    }
    if let Err(e) = client.get_transaction(MAINNET_KNOWN_TX) {
        fail!(e.to_string());
    }

    let batch_support = client.list_unspent_batch(&fake_hashes(2)).is_ok();

    let speed = if batch_support {
        measure_speed(&mut client, speed_test_duration, speed_test_batch_size)
    } else {
        0
    };

    // An error here just means the server refuses peer discovery, which is
    // common and not itself disqualifying.
    let peers = client.server_peers().unwrap_or_default();

    let is_worthy =
        batch_support && time_to_connect.as_secs_f64() < 5.0 && speed >= speed_test_duration.as_secs() as usize;

    ProbeOutcome {
        result: SurveyResult {
            server: task.server,
            from_peer: task.from_peer,
            is_worthy,
            error: None,
            server_impl,
            proto_version: client.proto_version().to_string(),
            time_to_connect,
            batch_support,
            speed,
        },
        peers,
    }
}

fn measure_speed(client: &mut Client, duration: Duration, batch_size: usize) -> usize {
    let start = Instant::now();
    let mut count = 0usize;
    while start.elapsed() < duration {
        match client.list_unspent_batch(&fake_hashes(batch_size)) {
            Ok(_) => count += 1,
            Err(e) => {
                warn!(error = %e, "speed test call failed");
                break;
            }
        }
    }
    count.saturating_sub(1)
}

fn fake_hashes(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut buf = [0u8; 32];
    (0..count)
        .map(|_| {
            rng.fill_bytes(&mut buf);
            hex::encode(buf)
        })
        .collect()
}
