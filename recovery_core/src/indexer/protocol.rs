//! Wire types for the subset of the Electrum JSON-RPC protocol the indexer
//! client speaks. Messages are newline-delimited JSON over a single TCP (or
//! TLS) stream; there is no length prefix and no framing beyond the `\n`
//! byte, so a reader must buffer until it sees one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MESSAGE_DELIM: u8 = b'\n';

/// Implementations known to support request batching, matched against the
/// prefix of `server.version`'s first element.
pub const IMPLS_WITH_BATCHING: &[&str] = &["ElectrumX"];

#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: u64,
    pub method: &'static str,
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(method: &'static str, params: Vec<Value>) -> Self {
        // id is assigned by the client right before it is put on the wire.
        Self { id: 0, method, params }
    }
}

/// The error field's shape varies across Electrum server implementations:
/// a plain string, a `{code, message}` object, or (rarely) a bare number.
/// We don't need to interpret it, only to know whether it is present and
/// to render it for diagnostics.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RpcError {
    Message(String),
    Structured(Value),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Message(s) => write!(f, "{s}"),
            RpcError::Structured(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaybeErrorResponse {
    pub id: Option<u64>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerFeatures {
    pub genesis_hash: String,
    #[serde(default)]
    pub hash_function: Option<String>,
    pub server_version: String,
    #[serde(default)]
    pub protocol_min: Option<String>,
    #[serde(default)]
    pub protocol_max: Option<String>,
    #[serde(default)]
    pub pruning: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnspentRef {
    pub tx_hash: String,
    pub tx_pos: u32,
    pub value: i64,
    #[serde(default)]
    pub height: i64,
}
