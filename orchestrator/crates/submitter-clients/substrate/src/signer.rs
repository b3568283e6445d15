use sp_core::{sr25519, Pair};

use crate::error::SubstrateError;
use crate::extrinsic::{AccountId, MultiSignature};

/// Key material signing extrinsic payloads.
pub trait Signer: Send + Sync {
    fn account_id(&self) -> AccountId;

    fn sign(&self, payload: &[u8]) -> MultiSignature;
}

pub struct Sr25519Signer {
    pair: sr25519::Pair,
}

impl Sr25519Signer {
    pub fn new(pair: sr25519::Pair) -> Self {
        Self { pair }
    }

    /// Accepts a secret URI such as `//Alice` or a mnemonic phrase.
    pub fn from_suri(suri: &str) -> Result<Self, SubstrateError> {
        let pair = sr25519::Pair::from_string(suri, None).map_err(|e| SubstrateError::InvalidSigner(format!("{e:?}")))?;
        Ok(Self::new(pair))
    }
}

impl Signer for Sr25519Signer {
    fn account_id(&self) -> AccountId {
        let mut account = [0u8; 32];
        account.copy_from_slice(self.pair.public().as_ref());
        account
    }

    fn sign(&self, payload: &[u8]) -> MultiSignature {
        let signature = self.pair.sign(payload);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(signature.as_ref());
        MultiSignature::Sr25519(bytes)
    }
}
