//! Connection Pool: a bounded, FIFO-fair set of [`Client`] connections,
//! created lazily against servers handed out by the [`ServerProvider`].

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;
use crate::indexer::client::Client;
use crate::indexer::provider::ServerProvider;

struct Inner {
    idle: VecDeque<Client>,
    outstanding: usize,
    capacity: usize,
}

/// A checked-out client. Returned to the pool automatically on drop, so a
/// panicking or early-returning caller never leaks a permanently-checked-out
/// slot.
pub struct PooledClient<'a> {
    pool: &'a Pool,
    client: Option<Client>,
}

impl<'a> std::ops::Deref for PooledClient<'a> {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client taken before drop")
    }
}

impl<'a> std::ops::DerefMut for PooledClient<'a> {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("client taken before drop")
    }
}

impl<'a> Drop for PooledClient<'a> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}

impl<'a> PooledClient<'a> {
    /// Drops the underlying connection instead of returning it to the idle
    /// queue, used after a client is found to be broken (timed out,
    /// disconnected) so the pool doesn't hand out a dead connection next.
    pub fn discard(mut self) {
        if let Some(client) = self.client.take() {
            drop(client);
        }
        self.pool.notify_capacity_freed();
    }
}

/// Thread-safe pool of Electrum clients. `acquire` blocks (bounded by the
/// caller via a timeout, if desired) until a client is available, creating
/// new ones lazily up to `capacity` by asking the [`ServerProvider`] for the
/// next server to connect to.
pub struct Pool {
    inner: Mutex<Inner>,
    not_empty: Condvar,
    provider: ServerProvider,
    requires_tls: bool,
    connect_timeout: Duration,
    call_timeout: Duration,
    batch_call_timeout: Duration,
}

impl Pool {
    pub fn new(
        capacity: usize,
        provider: ServerProvider,
        requires_tls: bool,
        connect_timeout: Duration,
        call_timeout: Duration,
        batch_call_timeout: Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                idle: VecDeque::new(),
                outstanding: 0,
                capacity,
            }),
            not_empty: Condvar::new(),
            provider,
            requires_tls,
            connect_timeout,
            call_timeout,
            batch_call_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("pool mutex poisoned").capacity
    }

    /// Checks out a connected client, blocking FIFO-fair behind whoever is
    /// already waiting. Creates a fresh connection (rotating servers via
    /// the provider, retrying on connect failure) when the pool has spare
    /// capacity and no idle client is on hand.
    pub fn acquire(&self) -> Result<PooledClient<'_>, Error> {
        loop {
            let mut guard = self.inner.lock().expect("pool mutex poisoned");

            if let Some(client) = guard.idle.pop_front() {
                guard.outstanding += 1;
                return Ok(PooledClient {
                    pool: self,
                    client: Some(client),
                });
            }

            if guard.outstanding < guard.capacity {
                guard.outstanding += 1;
                drop(guard);
                match self.connect_new() {
                    Ok(client) => {
                        return Ok(PooledClient {
                            pool: self,
                            client: Some(client),
                        })
                    }
                    Err(e) => {
                        // Give back the slot we reserved; the caller sees
                        // the connect error and may retry.
                        let mut guard = self.inner.lock().expect("pool mutex poisoned");
                        guard.outstanding -= 1;
                        self.not_empty.notify_one();
                        return Err(e);
                    }
                }
            }

            // Pool is at capacity and nothing idle: wait to be woken by a
            // release, a discard, or a newly created client.
            let (woken, timeout_result) = self
                .not_empty
                .wait_timeout(guard, Duration::from_secs(5))
                .expect("pool mutex poisoned");
            guard = woken;
            if timeout_result.timed_out() && guard.idle.is_empty() && guard.outstanding >= guard.capacity {
                drop(guard);
                continue;
            }
        }
    }

    fn connect_new(&self) -> Result<Client, Error> {
        let mut last_err = None;
        for _ in 0..self.provider.len().max(1) {
            let Some(server) = self.provider.next_server() else {
                return Err(Error::PoolExhausted);
            };
            let mut client = Client::new(
                self.requires_tls,
                self.connect_timeout,
                self.call_timeout,
                self.batch_call_timeout,
            );
            match client.connect(server) {
                Ok(()) => return Ok(client),
                Err(e) => {
                    warn!(server, error = %e, "pool: connect attempt failed, rotating");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(Error::PoolExhausted))
    }

    fn release(&self, client: Client) {
        let mut guard = self.inner.lock().expect("pool mutex poisoned");
        guard.outstanding -= 1;
        if client.is_connected() {
            guard.idle.push_back(client);
            debug!(idle = guard.idle.len(), "client returned to pool");
        }
        drop(guard);
        self.not_empty.notify_one();
    }

    fn notify_capacity_freed(&self) {
        let mut guard = self.inner.lock().expect("pool mutex poisoned");
        guard.outstanding -= 1;
        drop(guard);
        self.not_empty.notify_one();
    }
}
