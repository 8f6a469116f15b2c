pub mod access_token;
pub mod fingerprint_binding;
pub mod identity;
pub mod refresh_token;
pub mod session_policy;

pub use access_token::AccessToken;
pub use fingerprint_binding::{
    BINDING_LEN, FingerprintBinding, FingerprintBindingError,
};
pub use identity::{Identity, RoleTitle};
pub use refresh_token::{LifetimeOverflow, RefreshToken};
pub use session_policy::SessionPolicy;
