//! Logger/Diagnostics: two independent channels built on one `tracing`
//! subscriber.
//!
//! - A **transcript** layer is always on, capturing `INFO` and above into
//!   an in-memory buffer. It is never printed during normal execution; on a
//!   fatal error the CLI flushes it to `error_log` in the working
//!   directory. Since the transcript may end up on disk, nothing logged
//!   through it may include key material or the recovery code — those are
//!   logged, if at all, only at `TRACE` through the stdout channel.
//! - A **trace** layer prints everything to stdout, but only when the
//!   `DEBUG` environment variable is exactly `"true"`.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone)]
struct TranscriptWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for TranscriptWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("transcript mutex poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Owns the in-memory transcript buffer and installs the global `tracing`
/// subscriber. Must be created once, near the start of `main`.
pub struct Diagnostics {
    transcript: Arc<Mutex<Vec<u8>>>,
}

impl Diagnostics {
    pub fn init() -> Self {
        let transcript = Arc::new(Mutex::new(Vec::new()));
        let writer = TranscriptWriter(transcript.clone());

        let transcript_layer = tracing_subscriber::fmt::layer()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_target(true)
            .with_filter(LevelFilter::INFO);

        let debug_enabled = std::env::var("DEBUG").map(|v| v == "true").unwrap_or(false);
        let stdout_layer = debug_enabled.then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(LevelFilter::TRACE)
        });

        tracing_subscriber::registry()
            .with(transcript_layer)
            .with(stdout_layer)
            .init();

        Self { transcript }
    }

    /// Writes the accumulated transcript to `path`, for the exit-code-1
    /// fatal-error path. Overwrites any existing file at that path.
    pub fn flush_to_error_log(&self, path: &Path) -> io::Result<()> {
        let data = self.transcript.lock().expect("transcript mutex poisoned");
        std::fs::write(path, &*data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_writer_accumulates_bytes() {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let mut writer = TranscriptWriter(buf.clone());
        io::Write::write_all(&mut writer, b"hello ").unwrap();
        io::Write::write_all(&mut writer, b"world").unwrap();
        assert_eq!(&buf.lock().unwrap()[..], b"hello world");
    }
}
