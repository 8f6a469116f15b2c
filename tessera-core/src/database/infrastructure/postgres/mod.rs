//! PostgreSQL adapters implementing the database ports.

pub mod repositories;

pub use repositories::refresh_tokens::PostgresRefreshTokenRepository;
pub use repositories::roles::PostgresRoleRepository;
