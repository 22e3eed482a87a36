//! A minimal Electrum JSON-RPC client over TCP/TLS.
//!
//! The standard library has no JSON-RPC client at all, and the crates that
//! do exist assume in-order, one-response-per-request semantics. Electrum
//! batch requests can come back in a different order than they were sent,
//! and the `error` field's shape is not standardized across server
//! implementations, so this is hand-rolled directly against the wire
//! protocol rather than layered on top of a generic RPC crate.
//!
//! A `Client` owns exactly one connection and is not thread-safe; the
//! [`super::pool`] module is what makes a set of clients usable
//! concurrently.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls_pki_types::ServerName;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::indexer::protocol::{
    MaybeErrorResponse, RawResponse, Request, ServerFeatures, UnspentRef, IMPLS_WITH_BATCHING,
    MESSAGE_DELIM,
};

enum Stream {
    Tls(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
    Plain(TcpStream),
}

impl Stream {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let sock = match self {
            Stream::Tls(s) => &s.sock,
            Stream::Plain(s) => s,
        };
        sock.set_read_timeout(timeout)?;
        sock.set_write_timeout(timeout)
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tls(s) => s.read(buf),
            Stream::Plain(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tls(s) => s.write(buf),
            Stream::Plain(s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tls(s) => s.flush(),
            Stream::Plain(s) => s.flush(),
        }
    }
}

/// A `rustls::ClientCertVerifier` that accepts any certificate chain. This
/// mirrors the Go original's `InsecureSkipVerify: true`: the wallet never
/// had a pinned CA to check against, since these are arbitrary public
/// Electrum servers, so certificate validation buys nothing but a false
/// sense of safety. See DESIGN.md for the tradeoff this preserves.
#[derive(Debug)]
struct NoServerVerification(Arc<rustls::crypto::CryptoProvider>);

impl NoServerVerification {
    fn new(provider: Arc<rustls::crypto::CryptoProvider>) -> Arc<Self> {
        Arc::new(Self(provider))
    }
}

impl rustls::client::danger::ServerCertVerifier for NoServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls_pki_types::CertificateDer<'_>,
        _intermediates: &[rustls_pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls_pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls_pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
        .map(|_| rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls_pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
        .map(|_| rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// A connection to a single Electrum server. Not thread-safe: every
/// `Client` must have a single owner for its lifetime.
pub struct Client {
    server: String,
    server_impl: String,
    proto_version: String,
    next_request_id: u64,
    reader: Option<BufReader<Stream>>,
    requires_tls: bool,
    connect_timeout: Duration,
    call_timeout: Duration,
    batch_call_timeout: Duration,
}

impl Client {
    pub fn new(requires_tls: bool, connect_timeout: Duration, call_timeout: Duration, batch_call_timeout: Duration) -> Self {
        Self {
            server: String::new(),
            server_impl: String::new(),
            proto_version: String::new(),
            next_request_id: 0,
            reader: None,
            requires_tls,
            connect_timeout,
            call_timeout,
            batch_call_timeout,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn server_impl(&self) -> &str {
        &self.server_impl
    }

    pub fn proto_version(&self) -> &str {
        &self.proto_version
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    pub fn supports_batching(&self) -> bool {
        IMPLS_WITH_BATCHING
            .iter()
            .any(|prefix| self.server_impl.starts_with(prefix))
    }

    /// Connects to `server` (a `host:port` string), then issues a
    /// `server.version` call to identify the implementation. Any failure
    /// leaves the client disconnected.
    pub fn connect(&mut self, server: &str) -> Result<(), Error> {
        self.disconnect();
        self.server = server.to_string();

        let stream = self.establish_connection(server).map_err(|source| Error::Connect {
            server: server.to_string(),
            source,
        })?;
        self.reader = Some(BufReader::new(stream));

        let (server_impl, proto_version) = self.server_version()?;
        self.server_impl = server_impl;
        self.proto_version = proto_version;

        debug!(server, impl_ = %self.server_impl, proto = %self.proto_version, "identified electrum server");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.reader = None;
    }

    fn establish_connection(&self, server: &str) -> io::Result<Stream> {
        let addr = server
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved"))?;

        let tcp_result = TcpStream::connect_timeout(&addr, self.connect_timeout);

        let host = server.rsplit_once(':').map(|(h, _)| h).unwrap_or(server);

        match tcp_result.and_then(|tcp| self.wrap_tls(tcp, host)) {
            Ok(stream) => Ok(stream),
            Err(tls_err) if self.requires_tls => Err(tls_err),
            Err(_) => {
                let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
                Ok(Stream::Plain(tcp))
            }
        }
    }

    /// Builds the TLS session and immediately drives its handshake to
    /// completion against `tcp`, rather than deferring it to the first real
    /// read/write. A server that isn't actually speaking TLS (or a
    /// handshake failure of any kind) surfaces here as an `Err`, which is
    /// what lets `establish_connection` fall back to plain TCP instead of
    /// only catching `ClientConfig` construction errors.
    fn wrap_tls(&self, mut tcp: TcpStream, host: &str) -> io::Result<Stream> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = NoServerVerification::new(provider.clone());

        let tls_config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(io::Error::other)?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut conn = rustls::ClientConnection::new(Arc::new(tls_config), server_name)
            .map_err(io::Error::other)?;

        // Bound the handshake attempt: a peer that never speaks TLS at all
        // (e.g. a plaintext-only test server) must not be able to hang this
        // call forever.
        tcp.set_read_timeout(Some(self.connect_timeout))?;
        tcp.set_write_timeout(Some(self.connect_timeout))?;
        conn.complete_io(&mut tcp)?;

        Ok(Stream::Tls(Box::new(rustls::StreamOwned::new(conn, tcp))))
    }

    fn next_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    pub fn server_version(&mut self) -> Result<(String, String), Error> {
        let request = Request::new("server.version", vec![]);
        let value = self.call(request, self.call_timeout)?;
        let tuple: Vec<String> = serde_json::from_value(value)?;
        let mut it = tuple.into_iter();
        let impl_name = it.next().unwrap_or_default();
        let proto = it.next().unwrap_or_default();
        Ok((impl_name, proto))
    }

    pub fn server_features(&mut self) -> Result<ServerFeatures, Error> {
        let request = Request::new("server.features", vec![]);
        let value = self.call(request, self.call_timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Returns `(ip_or_domain, port)` pairs. The wire format is a
    /// `[ip, domain, [version, "s<ssl_port>", "t<tcp_port>"]]` tuple per
    /// peer, with ports in any order and possibly absent.
    pub fn server_peers(&mut self) -> Result<Vec<String>, Error> {
        let request = Request::new("server.peers.subscribe", vec![]);
        let value = self.call(request, self.call_timeout)?;
        let raw: Vec<Value> = serde_json::from_value(value)?;

        let mut peers = Vec::new();
        for entry in raw {
            let Some(items) = entry.as_array() else { continue };
            let Some(domain) = items.get(1).and_then(Value::as_str) else { continue };
            let Some(features) = items.get(2).and_then(Value::as_array) else { continue };

            let port = features
                .iter()
                .skip(1)
                .filter_map(Value::as_str)
                .find_map(|tag| tag.strip_prefix('t').or_else(|| tag.strip_prefix('s')));

            if let Some(port) = port {
                peers.push(format!("{domain}:{port}"));
            }
        }
        Ok(peers)
    }

    pub fn broadcast(&mut self, raw_tx_hex: &str) -> Result<String, Error> {
        let request = Request::new(
            "blockchain.transaction.broadcast",
            vec![Value::String(raw_tx_hex.to_string())],
        );
        let value = self.call(request, self.call_timeout).map_err(|e| Error::Broadcast {
            raw_tx_hex: raw_tx_hex.to_string(),
            message: e.to_string(),
        })?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn get_transaction(&mut self, tx_id: &str) -> Result<String, Error> {
        let request = Request::new(
            "blockchain.transaction.get",
            vec![Value::String(tx_id.to_string())],
        );
        let value = self.call(request, self.call_timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn list_unspent(&mut self, index_hash: &str) -> Result<Vec<UnspentRef>, Error> {
        let request = Request::new(
            "blockchain.scripthash.listunspent",
            vec![Value::String(index_hash.to_string())],
        );
        let value = self.call(request, self.call_timeout)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Batches `blockchain.scripthash.listunspent` calls for several index
    /// hashes into a single round trip. Results are returned in the same
    /// order as `index_hashes`, regardless of what order the server's
    /// response array used — the server is free to reorder.
    pub fn list_unspent_batch(&mut self, index_hashes: &[String]) -> Result<Vec<Vec<UnspentRef>>, Error> {
        let requests: Vec<Request> = index_hashes
            .iter()
            .map(|h| Request::new("blockchain.scripthash.listunspent", vec![Value::String(h.clone())]))
            .collect();

        let values = self.call_batch(requests, self.batch_call_timeout)?;

        let mut by_id: Vec<(u64, Vec<UnspentRef>)> = values
            .into_iter()
            .map(|(id, v)| Ok::<_, serde_json::Error>((id, serde_json::from_value(v)?)))
            .collect::<Result<_, _>>()?;
        by_id.sort_by_key(|(id, _)| *id);

        Ok(by_id.into_iter().map(|(_, v)| v).collect())
    }

    fn call(&mut self, mut request: Request, timeout: Duration) -> Result<Value, Error> {
        request.id = self.next_id();
        let method = request.method;
        let bytes = serde_json::to_vec(&request)?;

        let response_bytes = self.call_raw(method, &bytes, timeout)?;

        let maybe_error: MaybeErrorResponse = serde_json::from_slice(&response_bytes)?;
        if let Some(err) = maybe_error.error {
            return Err(Error::Server {
                server: self.server.clone(),
                method,
                message: err.to_string(),
            });
        }

        let response: RawResponse = serde_json::from_slice(&response_bytes)?;
        Ok(response.result)
    }

    /// Like [`Client::call`] but for a batch of requests sent as one JSON
    /// array. Returns `(id, result)` pairs in whatever order the server
    /// sent them — callers that need request order must sort by id
    /// themselves, since Electrum batch responses are not guaranteed to
    /// preserve it.
    fn call_batch(&mut self, mut requests: Vec<Request>, timeout: Duration) -> Result<Vec<(u64, Value)>, Error> {
        for request in &mut requests {
            request.id = self.next_id();
        }
        let method = requests.first().map(|r| r.method).unwrap_or("batch");
        let bytes = serde_json::to_vec(&requests)?;

        let response_bytes = self.call_raw(method, &bytes, timeout)?;

        let maybe_errors: Vec<MaybeErrorResponse> = serde_json::from_slice(&response_bytes)?;
        for maybe_error in &maybe_errors {
            if let Some(err) = &maybe_error.error {
                return Err(Error::Server {
                    server: self.server.clone(),
                    method,
                    message: err.to_string(),
                });
            }
        }

        let responses: Vec<RawResponse> = serde_json::from_slice(&response_bytes)?;
        Ok(responses.into_iter().map(|r| (r.id, r.result)).collect())
    }

    fn call_raw(&mut self, method: &'static str, request: &[u8], timeout: Duration) -> Result<Vec<u8>, Error> {
        trace!(method, body = %String::from_utf8_lossy(request), "sending");

        let reader = self.reader.as_mut().ok_or_else(|| Error::Server {
            server: self.server.clone(),
            method,
            message: "not connected".to_string(),
        })?;

        reader.get_mut().set_timeout(Some(timeout)).map_err(|source| Error::Connect {
            server: self.server.clone(),
            source,
        })?;

        let start = Instant::now();

        let mut framed = request.to_vec();
        framed.push(MESSAGE_DELIM);
        reader.get_mut().write_all(&framed).map_err(|source| {
            if source.kind() == io::ErrorKind::WouldBlock || source.kind() == io::ErrorKind::TimedOut {
                self.disconnect_on_timeout();
            }
            Error::Io(source)
        })?;

        let mut line = Vec::new();
        let read_result = reader.read_until(MESSAGE_DELIM, &mut line);
        let elapsed_ms = start.elapsed().as_millis();

        match read_result {
            Ok(0) => {
                warn!(method, "connection closed by peer");
                Err(Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")))
            }
            Ok(_) => {
                trace!(method, elapsed_ms, body = %String::from_utf8_lossy(&line), "received");
                Ok(line)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Err(Error::Timeout {
                    server: self.server.clone(),
                    method,
                    elapsed_ms,
                })
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn disconnect_on_timeout(&mut self) {
        self.reader = None;
    }
}
