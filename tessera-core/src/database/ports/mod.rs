pub mod refresh_tokens;
pub mod roles;

pub use refresh_tokens::{CappedInsert, EvictionFailed, RefreshTokenRepository};
pub use roles::RoleRepository;
