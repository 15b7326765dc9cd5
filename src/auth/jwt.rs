use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::JwtConfig, error::AuthError, state::AppState};

use super::claims::{Claims, TokenKind};

#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signing and verification keys for both token kinds.
///
/// Access and refresh tokens are signed with distinct secrets, so a token of
/// one kind never verifies against the other kind's key. The kind claim is
/// checked on top of that.
#[derive(Clone)]
pub struct JwtKeys {
    access: KeyPair,
    refresh: KeyPair,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            access_secret,
            refresh_secret,
            access_ttl_minutes,
            refresh_ttl_days,
        } = state.config.jwt.clone();
        Self::new(
            &access_secret,
            &refresh_secret,
            Duration::from_secs(access_ttl_minutes as u64 * 60),
            Duration::from_secs(refresh_ttl_days as u64 * 24 * 60 * 60),
        )
    }
}

impl JwtKeys {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign_with_kind(&self, user_id: Uuid, email: &str, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let (pair, ttl) = match kind {
            TokenKind::Access => (&self.access, self.access_ttl),
            TokenKind::Refresh => (&self.refresh, self.refresh_ttl),
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_owned(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            kind,
        };
        let token = encode(&Header::default(), &claims, &pair.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, email, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, email, TokenKind::Refresh)
    }

    /// Verify signature and expiry against the key for `expected`, then
    /// require the kind claim to match. Expiry has zero leeway.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let pair = match expected {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        };
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data =
            decode::<Claims>(token, &pair.decoding, &validation).map_err(|_| AuthError::InvalidToken)?;
        if data.claims.kind != expected {
            return Err(AuthError::InvalidToken);
        }
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }
}
