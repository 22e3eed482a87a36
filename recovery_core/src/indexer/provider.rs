//! Server Provider: hands out `host:port` addresses to rotate through when
//! building or refilling the connection pool.

use std::sync::atomic::{AtomicUsize, Ordering};

/// The public Electrum server list carried over from the original tool.
/// Kept as a flat list rather than anything fancier since rotation is the
/// only thing the pool needs from it; ranking happens offline, in the
/// Server Survey.
pub const PUBLIC_SERVERS: &[&str] = &[
    "electrum.blockstream.info:50002",
    "blockstream.info:700",
    "electrum.emzy.de:50002",
    "electrum.bitaroo.net:50002",
    "fortress.qtornado.com:50002",
    "electrum1.cipig.net:20000",
    "electrum2.cipig.net:20000",
    "electrum3.cipig.net:20000",
    "bitcoin.aranguren.org:50002",
    "electrum.bitkoins.nl:50002",
    "vmd104012.contaboserver.net:50002",
    "electrum.hodlister.co:50002",
    "electrum.qtornado.com:50002",
    "e.keff.org:50002",
    "ex.btchub.online:50002",
    "electrumx.electricnewyear.net:50002",
    "electrum.petrkr.net:50002",
    "bitcoin.lukechilds.co:50002",
    "electrumx.erbium.eu:50002",
    "elx.bitske.com:50002",
];

/// A round-robin cursor over a fixed server list, shared across pool
/// workers via an atomic counter rather than a lock — cheap enough that
/// contention here is never the pool's bottleneck.
pub struct ServerProvider {
    servers: Vec<String>,
    cursor: AtomicUsize,
}

impl ServerProvider {
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn with_public_servers() -> Self {
        Self::new(PUBLIC_SERVERS.iter().map(|s| s.to_string()).collect())
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Returns the next server to try, or `None` if the list is empty.
    /// Every call advances the cursor, so repeated failures naturally
    /// spread load across the whole list instead of hammering one server.
    pub fn next_server(&self) -> Option<&str> {
        if self.servers.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.servers.len();
        Some(&self.servers[i])
    }

    /// Returns a server other than `exclude`, for retry-on-a-different-server
    /// logic. Falls back to `next_server` if there is only one server.
    pub fn next_server_excluding(&self, exclude: &str) -> Option<&str> {
        if self.servers.len() <= 1 {
            return self.next_server();
        }
        for _ in 0..self.servers.len() {
            if let Some(s) = self.next_server() {
                if s != exclude {
                    return Some(s);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_through_all_servers() {
        let provider = ServerProvider::new(vec!["a".into(), "b".into(), "c".into()]);
        let picks: Vec<_> = (0..6).map(|_| provider.next_server().unwrap().to_string()).collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn excludes_the_failing_server() {
        let provider = ServerProvider::new(vec!["a".into(), "b".into()]);
        for _ in 0..10 {
            assert_eq!(provider.next_server_excluding("a").unwrap(), "b");
        }
    }
}
