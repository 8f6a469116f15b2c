use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::keys::SigningKeys;
use super::value_objects::{
    AccessToken, FingerprintBinding, FingerprintBindingError, RoleTitle,
};

#[derive(Debug, Error)]
pub enum CodecError {
    /// Signature and structure were fine but `exp` has passed.
    #[error("access token expired")]
    Expired,
    #[error("access token is malformed or forged")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign access token")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("access token lifetime runs past the representable time range")]
    LifetimeOverflow,
}

/// What the lifecycle service asks the codec to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub subject: Uuid,
    pub roles: BTreeSet<RoleTitle>,
    pub binding: FingerprintBinding,
}

/// Claims carried inside an access token.
///
/// `sub` and `fpt` stay in their wire representation; callers that need
/// typed values go through [`AccessClaims::binding`] and parse `sub`
/// themselves so that malformed values surface as distinct failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub sub: String,
    #[serde(default)]
    pub roles: BTreeSet<RoleTitle>,
    /// Hex-encoded fingerprint binding.
    pub fpt: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl AccessClaims {
    pub fn binding(&self) -> Result<FingerprintBinding, FingerprintBindingError> {
        self.fpt.parse()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.iat, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly signed token together with the claims that went into it.
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: AccessToken,
    pub claims: AccessClaims,
}

/// Builds and parses access-token envelopes.
///
/// Implementations never touch storage and never see raw fingerprints.
pub trait AccessTokenCodec: Send + Sync {
    /// Sign `grant` as if issued at `issued_at`; expiry is
    /// `issued_at + access age`.
    fn build_at(
        &self,
        grant: &AccessGrant,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, CodecError>;

    fn build(
        &self,
        grant: &AccessGrant,
    ) -> Result<IssuedAccessToken, CodecError> {
        self.build_at(grant, Utc::now())
    }

    /// Verify signature, issuer and expiry, returning the embedded claims.
    fn parse(&self, token: &str) -> Result<AccessClaims, CodecError>;
}

/// JWT implementation of [`AccessTokenCodec`] over an asymmetric key pair.
pub struct JwtAccessTokenCodec {
    keys: SigningKeys,
    issuer: String,
    access_age: Duration,
    validation: Validation,
}

impl fmt::Debug for JwtAccessTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAccessTokenCodec")
            .field("algorithm", &self.keys.algorithm())
            .field("issuer", &self.issuer)
            .field("access_age", &self.access_age)
            .finish()
    }
}

impl JwtAccessTokenCodec {
    pub fn new(
        keys: SigningKeys,
        issuer: impl Into<String>,
        access_age: Duration,
    ) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(keys.algorithm());
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = 0;

        Self {
            keys,
            issuer,
            access_age,
            validation,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn access_age(&self) -> Duration {
        self.access_age
    }
}

impl AccessTokenCodec for JwtAccessTokenCodec {
    fn build_at(
        &self,
        grant: &AccessGrant,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, CodecError> {
        let expires_at = issued_at
            .checked_add_signed(self.access_age)
            .ok_or(CodecError::LifetimeOverflow)?;

        let claims = AccessClaims {
            iss: self.issuer.clone(),
            sub: grant.subject.to_string(),
            roles: grant.roles.clone(),
            fpt: grant.binding.to_hex(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
        };

        let header = Header::new(self.keys.algorithm());
        let token =
            jsonwebtoken::encode(&header, &claims, self.keys.encoding_key())
                .map_err(CodecError::Signing)?;

        Ok(IssuedAccessToken {
            token: AccessToken::new(token),
            claims,
        })
    }

    fn parse(&self, token: &str) -> Result<AccessClaims, CodecError> {
        let data = jsonwebtoken::decode::<AccessClaims>(
            token,
            self.keys.decoding_key(),
            &self.validation,
        )
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => CodecError::Expired,
            _ => CodecError::Invalid(err),
        })?;

        // The library accepts `exp == now`; a token is only valid strictly
        // before its expiry.
        if data.claims.exp <= Utc::now().timestamp() {
            return Err(CodecError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tokens::keys::{ed25519_private_pem, ed25519_public_pem};
    use crate::domain::tokens::value_objects::BINDING_LEN;
    use jsonwebtoken::Algorithm;

    fn keys(seed: u8) -> SigningKeys {
        let seed = [seed; 32];
        SigningKeys::from_pem(
            Algorithm::EdDSA,
            ed25519_private_pem(&seed).unwrap().as_bytes(),
            ed25519_public_pem(&seed).unwrap().as_bytes(),
        )
        .unwrap()
    }

    fn codec() -> JwtAccessTokenCodec {
        JwtAccessTokenCodec::new(keys(3), "tessera-test", Duration::minutes(15))
    }

    fn grant() -> AccessGrant {
        AccessGrant {
            subject: Uuid::now_v7(),
            roles: ["admin", "viewer"].into_iter().map(RoleTitle::from).collect(),
            binding: FingerprintBinding::from_bytes([9; BINDING_LEN]),
        }
    }

    #[test]
    fn parse_returns_built_claims() {
        let codec = codec();
        let grant = grant();
        let issued = codec.build(&grant).unwrap();

        let parsed = codec.parse(issued.token.as_str()).unwrap();
        assert_eq!(parsed, issued.claims);
        assert_eq!(parsed.sub, grant.subject.to_string());
        assert_eq!(parsed.roles, grant.roles);
        assert_eq!(parsed.binding().unwrap(), grant.binding);
        assert_eq!(parsed.exp - parsed.iat, 15 * 60);
    }

    #[test]
    fn expired_tokens_are_distinguishable() {
        let codec = codec();
        let issued = codec
            .build_at(&grant(), Utc::now() - Duration::hours(1))
            .unwrap();

        assert!(matches!(
            codec.parse(issued.token.as_str()),
            Err(CodecError::Expired)
        ));
    }

    #[test]
    fn token_signed_by_other_key_is_invalid() {
        let forger =
            JwtAccessTokenCodec::new(keys(4), "tessera-test", Duration::minutes(15));
        let forged = forger.build(&grant()).unwrap();

        assert!(matches!(
            codec().parse(forged.token.as_str()),
            Err(CodecError::Invalid(_))
        ));
    }

    #[test]
    fn foreign_issuer_is_invalid() {
        let other =
            JwtAccessTokenCodec::new(keys(3), "someone-else", Duration::minutes(15));
        let issued = other.build(&grant()).unwrap();

        assert!(matches!(
            codec().parse(issued.token.as_str()),
            Err(CodecError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_and_tampered_tokens_are_invalid() {
        let codec = codec();
        assert!(matches!(
            codec.parse("definitely.not.a-jwt"),
            Err(CodecError::Invalid(_))
        ));

        let issued = codec.build(&grant()).unwrap();
        let mut parts: Vec<String> =
            issued.token.as_str().split('.').map(str::to_string).collect();
        let mut other = grant();
        other.roles.insert(RoleTitle::from("superuser"));
        let replacement = codec.build(&other).unwrap();
        parts[1] = replacement.token.as_str().split('.').nth(1).unwrap().to_string();
        let tampered = parts.join(".");

        assert!(matches!(
            codec.parse(&tampered),
            Err(CodecError::Invalid(_))
        ));
    }

    #[test]
    fn oversized_access_age_fails_instead_of_wrapping() {
        let codec = JwtAccessTokenCodec::new(
            keys(3),
            "tessera-test",
            Duration::days(365 * 300_000),
        );

        assert!(matches!(
            codec.build(&grant()),
            Err(CodecError::LifetimeOverflow)
        ));
    }
}
