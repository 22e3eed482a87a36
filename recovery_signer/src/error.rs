use thiserror::Error;

/// Failures decrypting a backup's encrypted extended key into a usable HD
/// root. Every branch here means "fatal, almost certainly the wrong
/// recovery code" — none of them are retried automatically.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("recovery code shape: {0}")]
    BadRecoveryCode(#[from] recovery_common::Error),

    #[error("key blob is not valid base58: {0}")]
    Base58(#[from] bitcoin::base58::Error),

    #[error("encrypted key is too short: expected at least {expected} bytes, got {actual}")]
    KeyTooShort { expected: usize, actual: usize },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("recovery code does not match this key")]
    BadPadding,

    #[error("decrypted key is malformed: {0}")]
    Bip32(#[from] bitcoin::bip32::Error),

    #[error("decrypted key is for the wrong network")]
    WrongNetwork,
}

/// Failures producing a signature for a sweep transaction.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("signer only supports bip32 keys produced by this crate")]
    UnsupportedKeyType,

    #[error("legacy P2SH signing is not supported by this signer")]
    LegacyUnsupported,

    #[error("derivation path error: {0}")]
    DerivationPath(#[from] bitcoin::bip32::Error),

    #[error("sighash computation failed: {0}")]
    Sighash(String),
}

impl From<VaultError> for recovery_common::Error {
    fn from(e: VaultError) -> Self {
        recovery_common::Error::Other(e.to_string())
    }
}

impl From<SignError> for recovery_common::Error {
    fn from(e: SignError) -> Self {
        recovery_common::Error::Other(e.to_string())
    }
}
