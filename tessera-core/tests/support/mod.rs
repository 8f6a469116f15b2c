#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use jsonwebtoken::Algorithm;

use tessera_core::domain::tokens::keys::{ed25519_private_pem, ed25519_public_pem};
use tessera_core::domain::tokens::{
    FingerprintBinder, JwtAccessTokenCodec, SigningKeys, TokenSettings,
};
use tessera_core::engine::{InMemoryBackends, TokenEngine};

pub const ISSUER: &str = "tessera-tests";
pub const BINDING_KEY: &[u8] = b"integration-binding-key-0123456789";

pub const LAPTOP: &[u8] = b"ua=firefox;tz=Europe/Berlin;screen=2560x1440";
pub const PHONE: &[u8] = b"ua=safari-ios;tz=Europe/Berlin;screen=390x844";

pub fn access_age() -> Duration {
    Duration::minutes(15)
}

/// Deterministic Ed25519 key pair derived from `seed`.
pub fn signing_keys(seed: u8) -> Result<SigningKeys> {
    let seed = [seed; 32];
    Ok(SigningKeys::from_pem(
        Algorithm::EdDSA,
        ed25519_private_pem(&seed)?.as_bytes(),
        ed25519_public_pem(&seed)?.as_bytes(),
    )?)
}

/// In-memory engine plus direct handles to its stores.
pub struct TestHarness {
    pub engine: TokenEngine,
    pub stores: InMemoryBackends,
    pub codec: Arc<JwtAccessTokenCodec>,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        Self::with_settings(TokenSettings::default())
    }

    pub fn with_cap(refresh_cap: usize) -> Result<Self> {
        Self::with_settings(TokenSettings {
            refresh_cap,
            ..TokenSettings::default()
        })
    }

    pub fn with_settings(settings: TokenSettings) -> Result<Self> {
        Self::build(settings, access_age())
    }

    /// Harness whose access tokens are already expired when issued.
    pub fn with_expired_access_tokens() -> Result<Self> {
        Self::build(TokenSettings::default(), Duration::seconds(-60))
    }

    fn build(settings: TokenSettings, access_age: Duration) -> Result<Self> {
        let codec = Arc::new(JwtAccessTokenCodec::new(
            signing_keys(7)?,
            ISSUER,
            access_age,
        ));
        let (engine, stores) = TokenEngine::in_memory(
            binder()?,
            codec.clone(),
            settings,
        )?;

        Ok(Self {
            engine,
            stores,
            codec,
        })
    }
}

pub fn binder() -> Result<FingerprintBinder> {
    Ok(FingerprintBinder::new(BINDING_KEY)?)
}
