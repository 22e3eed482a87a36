//! KeyVault: turns a recovery code and an encrypted key blob into a usable
//! HD root.
//!
//! The original wallet derives a symmetric key from the recovery code and
//! a per-key salt using a proprietary KDF, then decrypts the extended
//! private key with it. That KDF is not reproducible here; this vault
//! follows the same shape (salt extracted from the tail of the decoded
//! key blob, password-based key derivation, symmetric decryption of the
//! remainder) using `scrypt` and AES-256-CBC in its place. See DESIGN.md
//! for the approximation this makes.

use bitcoin::base58;
use bitcoin::bip32::Xpriv;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use recovery_common::{Error, HdPrivateKey, KeyVault};
use scrypt::Params;

use crate::error::VaultError;
use crate::hd::Bip32HdPrivateKey;

const RECOVERY_CODE_LEN: usize = 39;
const RECOVERY_CODE_DASHES: usize = 7;
const SALT_LEN: usize = 8;
const IV_LEN: usize = 16;
const KEY_LEN: usize = 32;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub struct MuunKeyVault {
    network: bitcoin::Network,
}

impl MuunKeyVault {
    pub fn new(network: bitcoin::Network) -> Self {
        Self { network }
    }
}

impl Default for MuunKeyVault {
    fn default() -> Self {
        Self::new(bitcoin::Network::Bitcoin)
    }
}

/// Uppercases and shape-checks a recovery code: exactly 39 characters,
/// exactly 7 `-` separators. Lowercase input is accepted and normalized.
pub fn normalize_recovery_code(code: &str) -> Result<String, Error> {
    let normalized = code.trim().to_uppercase();
    let dashes = normalized.matches('-').count();
    if normalized.chars().count() != RECOVERY_CODE_LEN || dashes != RECOVERY_CODE_DASHES {
        return Err(Error::BadRecoveryCodeShape {
            expected: RECOVERY_CODE_LEN,
            actual: normalized.chars().count(),
        });
    }
    Ok(normalized)
}

impl KeyVault for MuunKeyVault {
    fn decrypt(&self, recovery_code: &str, encrypted_key: &str) -> Result<Box<dyn HdPrivateKey>, Error> {
        Ok(self.decrypt_inner(recovery_code, encrypted_key)?)
    }
}

impl MuunKeyVault {
    fn decrypt_inner(&self, recovery_code: &str, encrypted_key: &str) -> Result<Box<dyn HdPrivateKey>, VaultError> {
        let recovery_code = normalize_recovery_code(recovery_code)?;

        let raw = base58::decode(encrypted_key.trim())?;
        let min_len = SALT_LEN + IV_LEN + 1;
        if raw.len() < min_len {
            return Err(VaultError::KeyTooShort {
                expected: min_len,
                actual: raw.len(),
            });
        }

        let (body, salt) = raw.split_at(raw.len() - SALT_LEN);
        let (iv, ciphertext) = body.split_at(IV_LEN);

        let derived_key = derive_decryption_key(recovery_code.as_bytes(), salt)?;

        let mut buf = ciphertext.to_vec();
        let decryptor = Aes256CbcDec::new_from_slices(&derived_key, iv)
            .map_err(|e| VaultError::Kdf(format!("bad decryption key/iv length: {e}")))?;
        let plaintext = decryptor
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| VaultError::BadPadding)?;

        let xpriv = Xpriv::decode(plaintext)?;
        if xpriv.network != self.network.into() {
            return Err(VaultError::WrongNetwork);
        }

        Ok(Box::new(Bip32HdPrivateKey::new(xpriv)))
    }
}

fn derive_decryption_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN], VaultError> {
    let params = Params::new(14, 8, 1, KEY_LEN).map_err(|e| VaultError::Kdf(e.to_string()))?;
    let mut out = [0u8; KEY_LEN];
    scrypt::scrypt(password, salt, &params, &mut out).map_err(|e| VaultError::Kdf(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_recovery_code_shape() {
        let err = normalize_recovery_code("abcd-1234").unwrap_err();
        assert!(matches!(err, Error::BadRecoveryCodeShape { .. }));
    }

    #[test]
    fn accepts_and_uppercases_a_well_formed_code() {
        let code = "abcd-1234-pow2-r561-p120-jk26-12rw-45tt";
        let normalized = normalize_recovery_code(code).unwrap();
        assert_eq!(normalized, code.to_uppercase());
        assert_eq!(normalized.chars().count(), 39);
    }
}
