use thiserror::Error;

/// Errors surfaced by the shared model and by collaborator contracts.
///
/// These map onto the `InputError` branch of the error taxonomy: all of
/// them are recoverable by re-prompting the user, never by retrying a
/// network call.
#[derive(Debug, Error)]
pub enum Error {
    #[error("recovery code must be {expected} words, got {actual}")]
    BadRecoveryCodeShape { expected: usize, actual: usize },

    #[error("key material has wrong length: expected {expected} bytes, got {actual}")]
    BadKeyLength { expected: usize, actual: usize },

    #[error("malformed address: {0}")]
    BadAddress(String),

    #[error("malformed derivation path: {0}")]
    BadDerivationPath(String),

    #[error("backup could not be read: {0}")]
    BackupUnreadable(String),

    #[error("bitcoin key error: {0}")]
    Bip32(#[from] bitcoin::bip32::Error),

    #[error("{0}")]
    Other(String),
}
