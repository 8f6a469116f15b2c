//! Storage ports and their adapters.

pub mod infrastructure;
pub mod ports;

pub use infrastructure::memory::{InMemoryRefreshTokenStore, InMemoryRoleStore};
#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub use infrastructure::postgres::{
    PostgresRefreshTokenRepository, PostgresRoleRepository,
};
pub use ports::{
    CappedInsert, EvictionFailed, RefreshTokenRepository, RoleRepository,
};
