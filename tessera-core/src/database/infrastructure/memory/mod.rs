//! Embedded adapters for tests and single-process deployments.

pub mod refresh_tokens;
pub mod roles;

pub use refresh_tokens::InMemoryRefreshTokenStore;
pub use roles::InMemoryRoleStore;
