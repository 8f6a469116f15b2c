use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifetime policy requested when a refresh token is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// "Remember me" login; the refresh token lives for the full refresh age
    #[default]
    Persistent,
    /// Browser-session login; shorter lifetime and no persistent cookie
    SessionScoped,
}

impl SessionPolicy {
    pub const PERSISTENT: &'static str = "persistent";
    pub const SESSION_SCOPED: &'static str = "session_scoped";

    pub fn as_str(self) -> &'static str {
        match self {
            SessionPolicy::Persistent => Self::PERSISTENT,
            SessionPolicy::SessionScoped => Self::SESSION_SCOPED,
        }
    }

    pub fn is_persistent(self) -> bool {
        matches!(self, SessionPolicy::Persistent)
    }

    pub fn from_persistent(persistent: bool) -> Self {
        if persistent {
            SessionPolicy::Persistent
        } else {
            SessionPolicy::SessionScoped
        }
    }
}

impl fmt::Display for SessionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionPolicy {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::PERSISTENT => Ok(SessionPolicy::Persistent),
            Self::SESSION_SCOPED => Ok(SessionPolicy::SessionScoped),
            _ => Err("invalid session policy"),
        }
    }
}
