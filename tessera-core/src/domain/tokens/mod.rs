//! Token lifecycle: fingerprint binding, the access-token codec, key loading
//! and the services built on top of them.

pub mod codec;
pub mod crypto;
pub mod keys;
pub mod services;
pub mod value_objects;

pub use codec::{
    AccessClaims, AccessGrant, AccessTokenCodec, CodecError,
    IssuedAccessToken, JwtAccessTokenCodec,
};
pub use crypto::{BinderError, BindingMismatch, FingerprintBinder};
pub use keys::{
    KeyEncodingError, KeyLoadError, SigningKeys, is_supported_algorithm,
};
pub use services::{
    MAX_TOKEN_AGE_DAYS, SettingsError, TokenPair, TokenService,
    TokenSettings, VerificationService, max_token_age,
};
