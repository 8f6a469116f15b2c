use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title of a role granted to a user (e.g. `admin`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoleTitle(String);

impl RoleTitle {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleTitle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RoleTitle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for RoleTitle {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Authenticated caller produced by a successful access-token verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub roles: BTreeSet<RoleTitle>,
}

impl Identity {
    pub fn has_role(&self, title: &str) -> bool {
        self.roles.contains(title)
    }
}
