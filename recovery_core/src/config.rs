use std::time::Duration;

/// Runtime knobs for the discovery and sweep pipeline. Defaults match the
/// behavior of the original recovery tool; the CLI overrides a handful of
/// them from flags.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connections kept open by the pool at any one time.
    pub pool_size: usize,
    /// Addresses per `blockchain.scripthash.listunspent` batch request.
    pub batch_size: usize,
    /// Wall-clock budget for a single scan task (one batch against one
    /// server) before it is considered hung and retried elsewhere.
    pub task_timeout: Duration,
    /// Per-RPC-call timeout used for single (non-batch) requests.
    pub call_timeout: Duration,
    /// Per-RPC-call timeout used for batch requests; longer, since a batch
    /// does more work per round trip.
    pub batch_call_timeout: Duration,
    /// TCP/TLS handshake timeout.
    pub connect_timeout: Duration,
    /// If true, a plaintext fallback connection is refused when TLS fails.
    pub tls_required: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: 6,
            batch_size: 100,
            task_timeout: Duration::from_secs(120),
            call_timeout: Duration::from_secs(30),
            batch_call_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            tls_required: true,
        }
    }
}
