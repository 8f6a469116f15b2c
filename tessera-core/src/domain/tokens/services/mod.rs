pub mod token_service;
pub mod verification_service;

use std::time::Duration as StdDuration;

use chrono::Duration;
use thiserror::Error;

use super::value_objects::SessionPolicy;

pub use token_service::{TokenPair, TokenService};
pub use verification_service::VerificationService;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("refresh cap must be at least 1")]
    ZeroRefreshCap,
    #[error("{0} must be positive")]
    NonPositiveAge(&'static str),
    #[error("{0} exceeds the maximum token age of {max} days", max = MAX_TOKEN_AGE_DAYS)]
    AgeTooLarge(&'static str),
    #[error("store timeout must be non-zero")]
    ZeroStoreTimeout,
}

/// Longest lifetime accepted for any token.
pub const MAX_TOKEN_AGE_DAYS: i64 = 100 * 365;

pub fn max_token_age() -> Duration {
    Duration::days(MAX_TOKEN_AGE_DAYS)
}

/// Lifetimes and limits of the refresh-token lifecycle. The access-token
/// lifetime belongs to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSettings {
    /// Lifetime of [`SessionPolicy::Persistent`] refresh tokens.
    pub refresh_age: Duration,
    /// Lifetime of [`SessionPolicy::SessionScoped`] refresh tokens.
    pub session_refresh_age: Duration,
    /// Maximum number of live refresh tokens per user.
    pub refresh_cap: usize,
    /// Upper bound on a single store round-trip.
    pub store_timeout: StdDuration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            refresh_age: Duration::days(30),
            session_refresh_age: Duration::hours(12),
            refresh_cap: 5,
            store_timeout: StdDuration::from_secs(5),
        }
    }
}

impl TokenSettings {
    pub fn refresh_lifetime(&self, policy: SessionPolicy) -> Duration {
        match policy {
            SessionPolicy::Persistent => self.refresh_age,
            SessionPolicy::SessionScoped => self.session_refresh_age,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.refresh_cap == 0 {
            return Err(SettingsError::ZeroRefreshCap);
        }
        for (name, age) in [
            ("refresh_age", self.refresh_age),
            ("session_refresh_age", self.session_refresh_age),
        ] {
            if age <= Duration::zero() {
                return Err(SettingsError::NonPositiveAge(name));
            }
            if age > max_token_age() {
                return Err(SettingsError::AgeTooLarge(name));
            }
        }
        if self.store_timeout.is_zero() {
            return Err(SettingsError::ZeroStoreTimeout);
        }
        Ok(())
    }
}
