//! BIP32 implementation of the `HdPrivateKey` contract, backing both the
//! user's and the cosigning server's root keys.

use std::str::FromStr;
use std::sync::Arc;

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::PublicKey;
use recovery_common::{Error, HdPrivateKey};

#[derive(Clone)]
pub struct Bip32HdPrivateKey {
    secp: Arc<Secp256k1<All>>,
    xpriv: Xpriv,
}

impl Bip32HdPrivateKey {
    pub fn new(xpriv: Xpriv) -> Self {
        Self {
            secp: Arc::new(Secp256k1::new()),
            xpriv,
        }
    }

    pub fn from_root(xpriv: Xpriv, secp: Arc<Secp256k1<All>>) -> Self {
        Self { secp, xpriv }
    }

    pub fn xpriv(&self) -> &Xpriv {
        &self.xpriv
    }
}

impl HdPrivateKey for Bip32HdPrivateKey {
    fn derive_to(&self, path: &str) -> Result<Box<dyn HdPrivateKey>, Error> {
        let path = DerivationPath::from_str(path).map_err(Error::Bip32)?;
        let derived = self
            .xpriv
            .derive_priv(&self.secp, &path)
            .map_err(Error::Bip32)?;
        Ok(Box::new(Bip32HdPrivateKey::from_root(derived, self.secp.clone())))
    }

    fn derived_at(&self, index: u32, hardened: bool) -> Result<Box<dyn HdPrivateKey>, Error> {
        let child = if hardened {
            ChildNumber::from_hardened_idx(index)
        } else {
            ChildNumber::from_normal_idx(index)
        }
        .map_err(Error::Bip32)?;

        let derived = self
            .xpriv
            .derive_priv(&self.secp, &[child])
            .map_err(Error::Bip32)?;
        Ok(Box::new(Bip32HdPrivateKey::from_root(derived, self.secp.clone())))
    }

    fn public_key(&self) -> PublicKey {
        let priv_key = self.xpriv.to_priv();
        PublicKey::from_private_key(&self.secp, &priv_key)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
