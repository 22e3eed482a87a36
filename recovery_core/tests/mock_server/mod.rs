//! An in-process, newline-delimited JSON-RPC mock Electrum server, driven
//! by a background thread per spec.md §8's "concrete scenarios". Each
//! accepted connection gets its own handler thread; `handler` answers every
//! method call with either a result or an error message.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

type Handler = dyn Fn(&str, &[Value]) -> Result<Value, String> + Send + Sync;

pub struct MockServer {
    pub addr: String,
}

impl MockServer {
    /// Starts serving connections in the background. There is no explicit
    /// shutdown handle: the listener thread and its per-connection workers
    /// are daemons that die with the test process.
    pub fn start(handler: impl Fn(&str, &[Value]) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock electrum server");
        let addr = listener.local_addr().expect("local addr").to_string();
        let handler: Arc<Handler> = Arc::new(handler);

        thread::spawn(move || {
            for incoming in listener.incoming() {
                let Ok(stream) = incoming else { continue };
                let handler = handler.clone();
                thread::spawn(move || serve_connection(stream, handler));
            }
        });

        Self { addr }
    }
}

fn serve_connection(stream: TcpStream, handler: Arc<Handler>) {
    let mut writer = stream.try_clone().expect("clone stream for writer");
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok();
    let mut reader = BufReader::new(stream);

    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return,
            Err(_) => return,
            Ok(_) => {}
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let Ok(parsed) = serde_json::from_slice::<Value>(&line) else {
            return;
        };

        let response = match parsed {
            Value::Array(requests) => {
                // Real Electrum servers don't guarantee batch response
                // order; reversing here exercises the client's sort-by-id
                // reconstruction instead of accidentally passing on an
                // already-in-order response stream.
                let mut responses: Vec<Value> = requests.iter().map(|r| respond_one(r, &handler)).collect();
                responses.reverse();
                Value::Array(responses)
            }
            single => respond_one(&single, &handler),
        };

        let mut bytes = serde_json::to_vec(&response).expect("serialize mock response");
        bytes.push(b'\n');
        if writer.write_all(&bytes).is_err() {
            return;
        }
    }
}

fn respond_one(request: &Value, handler: &Arc<Handler>) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let params: Vec<Value> = request
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    match handler(method, &params) {
        Ok(result) => json!({ "id": id, "result": result }),
        Err(message) => json!({ "id": id, "error": message }),
    }
}

/// A `server.version`/`server.features` pair that marks the mock as an
/// ElectrumX-compatible, batching-capable implementation.
pub fn electrumx_identity() -> Value {
    json!(["ElectrumX 1.16.0", "1.4"])
}
