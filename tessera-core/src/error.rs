use std::fmt;

use thiserror::Error;

use crate::domain::tokens::codec::CodecError;

/// Failure of a token lifecycle or verification operation.
///
/// The variants are precise for logging. Anything that leaves the process
/// goes through [`TokenError::rejection`], which collapses the
/// credential failures into one indistinguishable answer.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("refresh token not found")]
    TokenNotFound,
    #[error("token expired")]
    TokenExpired,
    #[error("fingerprint does not match token binding")]
    FingerprintMismatch,
    #[error("token signature or structure is invalid")]
    TokenInvalid,
    #[error("token subject is not a valid user id")]
    UserIdInvalid,
    #[error("failed to evict refresh tokens over capacity")]
    CapacityExceeded(#[source] anyhow::Error),
    #[error("token store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("failed to sign access token")]
    Signing(#[source] CodecError),
    #[error("configured token lifetime runs past the representable time range")]
    LifetimeOverflow,
}

impl TokenError {
    pub fn rejection(&self) -> Rejection {
        match self {
            Self::TokenNotFound => Rejection::NOT_FOUND,
            Self::TokenExpired => Rejection::EXPIRED,
            Self::FingerprintMismatch
            | Self::TokenInvalid
            | Self::UserIdInvalid => Rejection::INVALID,
            Self::CapacityExceeded(_) | Self::StoreUnavailable(_) => {
                Rejection::UNAVAILABLE
            }
            Self::Signing(_) | Self::LifetimeOverflow => Rejection::INTERNAL,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.rejection().is_retryable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    Unauthorized,
    NotFound,
    Unavailable,
    Internal,
}

/// Boundary-safe view of a [`TokenError`]: a coarse kind plus a fixed
/// message that never names the check that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rejection {
    kind: RejectionKind,
    message: &'static str,
}

impl Rejection {
    const NOT_FOUND: Self = Self {
        kind: RejectionKind::NotFound,
        message: "token not found",
    };
    const EXPIRED: Self = Self {
        kind: RejectionKind::Unauthorized,
        message: "token expired",
    };
    const INVALID: Self = Self {
        kind: RejectionKind::Unauthorized,
        message: "invalid token",
    };
    const UNAVAILABLE: Self = Self {
        kind: RejectionKind::Unavailable,
        message: "service temporarily unavailable",
    };
    const INTERNAL: Self = Self {
        kind: RejectionKind::Internal,
        message: "internal error",
    };

    pub fn kind(&self) -> RejectionKind {
        self.kind
    }

    pub fn message(&self) -> &'static str {
        self.message
    }

    /// Only transient store failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind == RejectionKind::Unavailable
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_one_rejection() {
        let mismatch = TokenError::FingerprintMismatch.rejection();
        let invalid = TokenError::TokenInvalid.rejection();
        let bad_subject = TokenError::UserIdInvalid.rejection();

        assert_eq!(mismatch, invalid);
        assert_eq!(invalid, bad_subject);
        assert_eq!(mismatch.to_string(), "invalid token");
        assert_eq!(mismatch.kind(), RejectionKind::Unauthorized);
    }

    #[test]
    fn only_store_failures_are_retryable() {
        assert!(
            TokenError::StoreUnavailable(anyhow::anyhow!("timed out"))
                .is_retryable()
        );
        assert!(
            TokenError::CapacityExceeded(anyhow::anyhow!("lock lost"))
                .is_retryable()
        );

        for terminal in [
            TokenError::TokenNotFound,
            TokenError::TokenExpired,
            TokenError::FingerprintMismatch,
            TokenError::TokenInvalid,
            TokenError::UserIdInvalid,
            TokenError::LifetimeOverflow,
        ] {
            assert!(!terminal.is_retryable(), "{terminal} must be terminal");
        }
    }

    #[test]
    fn public_messages_hide_internal_detail() {
        let err = TokenError::StoreUnavailable(anyhow::anyhow!(
            "connection refused to db.internal:5432"
        ));
        assert!(!err.rejection().message().contains("db.internal"));
    }
}
