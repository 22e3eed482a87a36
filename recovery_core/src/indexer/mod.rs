pub mod client;
pub mod pool;
pub mod protocol;
pub mod provider;

pub use client::Client;
pub use pool::{Pool, PooledClient};
pub use provider::ServerProvider;
