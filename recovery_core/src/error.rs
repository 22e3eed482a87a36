use thiserror::Error;

/// The recovery pipeline's error taxonomy. Each branch carries its own
/// recovery semantics for the caller:
///
/// - [`Error::Connect`] and [`Error::Server`] are locally recovered by
///   rotating to another server via the Server Provider; callers should
///   retry, not abort.
/// - [`Error::Scan`] is fatal for the current run once retried once.
/// - [`Error::Build`] and [`Error::Broadcast`] are fatal; `Broadcast`
///   additionally carries the raw signed transaction hex so it can be
///   logged for manual rebroadcast.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not connect to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server {server} rejected {method}: {message}")]
    Server {
        server: String,
        method: &'static str,
        message: String,
    },

    #[error("server {server} timed out after {elapsed_ms}ms on {method}")]
    Timeout {
        server: String,
        method: &'static str,
        elapsed_ms: u128,
    },

    #[error("scan failed: {0}")]
    Scan(String),

    #[error("transaction build failed: {0}")]
    Build(String),

    #[error("broadcast failed, raw transaction was: {raw_tx_hex}: {message}")]
    Broadcast { raw_tx_hex: String, message: String },

    #[error("pool exhausted: no server available")]
    PoolExhausted,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Bitcoin(#[from] bitcoin::address::ParseError),

    #[error(transparent)]
    Common(#[from] recovery_common::Error),

    #[error("{0}")]
    Other(String),
}
