use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use super::value_objects::{BINDING_LEN, FingerprintBinding};

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation label mixed into every binding so the key cannot be
/// reused to forge MACs for other purposes.
const BINDING_CONTEXT: &[u8] = b"tessera/fingerprint-binding/v1";

#[derive(Debug, Error)]
pub enum BinderError {
    #[error("fingerprint binding key must not be empty")]
    EmptyKey,
    #[error("fingerprint binding key is not a valid HMAC-SHA-256 key")]
    InvalidKey,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("fingerprint binding mismatch")]
pub struct BindingMismatch;

/// Derives and checks the keyed hash tying a token to a client fingerprint.
///
/// The user id is part of the MAC input, so two users presenting identical
/// raw fingerprint material still receive different bindings. The helper is
/// stateless apart from the key loaded at startup.
pub struct FingerprintBinder {
    /// MAC already keyed with the binding key; cloned per binding.
    keyed: HmacSha256,
    key_len: usize,
}

impl std::fmt::Debug for FingerprintBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintBinder")
            .field("key_len", &self.key_len)
            .finish()
    }
}

impl FingerprintBinder {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, BinderError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(BinderError::EmptyKey);
        }

        let keyed = HmacSha256::new_from_slice(key)
            .map_err(|_| BinderError::InvalidKey)?;

        Ok(Self {
            keyed,
            key_len: key.len(),
        })
    }

    /// Compute the binding for `(user_id, raw_fingerprint)`.
    pub fn bind(
        &self,
        user_id: Uuid,
        raw_fingerprint: &[u8],
    ) -> FingerprintBinding {
        let mut mac = self.keyed.clone();
        mac.update(BINDING_CONTEXT);
        mac.update(user_id.as_bytes());
        mac.update(raw_fingerprint);

        let digest = mac.finalize().into_bytes();
        let mut bytes = [0u8; BINDING_LEN];
        bytes.copy_from_slice(&digest);
        FingerprintBinding::from_bytes(bytes)
    }

    /// Compare a presented binding with the expected one in constant time.
    pub fn verify(
        &self,
        candidate: &FingerprintBinding,
        expected: &FingerprintBinding,
    ) -> Result<(), BindingMismatch> {
        if candidate.ct_eq(expected) {
            Ok(())
        } else {
            Err(BindingMismatch)
        }
    }

    /// Recompute the binding from raw material and check it against
    /// `expected`.
    pub fn verify_raw(
        &self,
        user_id: Uuid,
        raw_fingerprint: &[u8],
        expected: &FingerprintBinding,
    ) -> Result<(), BindingMismatch> {
        let candidate = self.bind(user_id, raw_fingerprint);
        self.verify(&candidate, expected)
    }
}
