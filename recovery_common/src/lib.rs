#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! Shared model, error taxonomy and external-collaborator contracts used by
//! `recovery_core`, `recovery_signer` and `recovery_cli`.
//!
//! The collaborators in [`contracts`] (`KeyVault`, `ScriptFactory`, `Signer`,
//! `BackupReader`) are specified here only as interfaces: the core pipeline
//! in `recovery_core` is generic over them and never assumes a concrete
//! implementation.

pub mod contracts;
pub mod error;
pub mod model;

pub use contracts::{BackupContents, BackupReader, HdPrivateKey, ScriptFactory, Signer, KeyVault};
pub use error::Error;
pub use model::{IndexHash, MuunAddress, ScriptVersion, Utxo};
