pub mod refresh_tokens;
pub mod roles;
