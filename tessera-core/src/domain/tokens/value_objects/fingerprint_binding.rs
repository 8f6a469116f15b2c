use std::fmt;
use std::str::FromStr;

use constant_time_eq::constant_time_eq_32;
use thiserror::Error;

/// Length in bytes of an HMAC-SHA-256 output.
pub const BINDING_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintBindingError {
    #[error("fingerprint binding must be {BINDING_LEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error("fingerprint binding is not valid hex")]
    InvalidHex,
}

/// One-way value proving a token was issued to a specific (user, fingerprint)
/// pair.
///
/// The binding is embedded in every access token and replicated onto the
/// refresh-token record. Equality checks go through
/// [`FingerprintBinding::ct_eq`]; the derived `PartialEq` exists for tests
/// and collections only.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerprintBinding([u8; BINDING_LEN]);

impl FingerprintBinding {
    pub fn from_bytes(bytes: [u8; BINDING_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, FingerprintBindingError> {
        let array: [u8; BINDING_LEN] = bytes
            .try_into()
            .map_err(|_| FingerprintBindingError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; BINDING_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Constant-time comparison against another binding.
    pub fn ct_eq(&self, other: &FingerprintBinding) -> bool {
        constant_time_eq_32(&self.0, &other.0)
    }
}

impl fmt::Debug for FingerprintBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FingerprintBinding")
            .field(&format_args!("{}…", &self.to_hex()[..8]))
            .finish()
    }
}

impl fmt::Display for FingerprintBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for FingerprintBinding {
    type Err = FingerprintBindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != BINDING_LEN * 2 {
            return Err(FingerprintBindingError::InvalidLength(s.len() / 2));
        }
        let bytes =
            hex::decode(s).map_err(|_| FingerprintBindingError::InvalidHex)?;
        Self::from_slice(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_preserves_bytes() {
        let binding = FingerprintBinding::from_bytes([0xab; BINDING_LEN]);
        let parsed: FingerprintBinding = binding.to_string().parse().unwrap();
        assert!(parsed.ct_eq(&binding));
    }

    #[test]
    fn rejects_short_and_non_hex_input() {
        assert_eq!(
            "abcd".parse::<FingerprintBinding>(),
            Err(FingerprintBindingError::InvalidLength(2))
        );
        let bogus = "zz".repeat(BINDING_LEN);
        assert_eq!(
            bogus.parse::<FingerprintBinding>(),
            Err(FingerprintBindingError::InvalidHex)
        );
    }

    #[test]
    fn debug_output_is_truncated() {
        let binding = FingerprintBinding::from_bytes([0x11; BINDING_LEN]);
        let rendered = format!("{binding:?}");
        assert!(!rendered.contains(&binding.to_hex()));
        assert!(rendered.contains("11111111"));
    }
}
