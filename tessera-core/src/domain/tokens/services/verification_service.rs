use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::domain::tokens::codec::{AccessTokenCodec, CodecError};
use crate::domain::tokens::crypto::FingerprintBinder;
use crate::domain::tokens::value_objects::Identity;
use crate::error::TokenError;

/// Stateless access-token verification. Never touches the refresh store.
pub struct VerificationService {
    codec: Arc<dyn AccessTokenCodec>,
    binder: Arc<FingerprintBinder>,
}

impl fmt::Debug for VerificationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationService").finish_non_exhaustive()
    }
}

impl VerificationService {
    pub fn new(
        codec: Arc<dyn AccessTokenCodec>,
        binder: Arc<FingerprintBinder>,
    ) -> Self {
        Self { codec, binder }
    }

    pub fn verify(
        &self,
        token: &str,
        fingerprint: &[u8],
    ) -> Result<Identity, TokenError> {
        let claims = self.codec.parse(token).map_err(|err| match err {
            CodecError::Expired => TokenError::TokenExpired,
            other => {
                debug!(error = %other, "Rejected access token");
                TokenError::TokenInvalid
            }
        })?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| TokenError::UserIdInvalid)?;
        let embedded = claims.binding().map_err(|_| TokenError::TokenInvalid)?;

        self.binder
            .verify_raw(user_id, fingerprint, &embedded)
            .map_err(|_| {
                debug!(user_id = %user_id, jti = %claims.jti, "Access token fingerprint mismatch");
                TokenError::FingerprintMismatch
            })?;

        Ok(Identity {
            user_id,
            roles: claims.roles,
        })
    }
}
