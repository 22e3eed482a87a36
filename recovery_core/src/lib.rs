//! UTXO discovery and sweep pipeline: the Indexer Client, Connection Pool,
//! Server Provider, Address Generator, Scanner, Server Survey, Sweeper and
//! Logger/Diagnostics components.
//!
//! This crate is generic over the collaborators it does not own —
//! `HdPrivateKey`, `ScriptFactory`, `Signer`, `KeyVault`, `BackupReader` —
//! which live behind the traits in [`recovery_common::contracts`].
//! Concrete implementations live in `recovery_signer`.

pub mod address;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod indexer;
pub mod scan;
pub mod survey;
pub mod sweep;

pub use config::Config;
pub use error::Error;
