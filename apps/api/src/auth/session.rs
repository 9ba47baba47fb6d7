//! Session credentials: HS256 JWTs that carry the identity reference and are verified
//! without an identity lookup. Logout adds the credential's `jti` to a denylist that
//! lives until the credential would have expired anyway.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::identity::Identity;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("credential rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("credential expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Identity id.
    pub sub: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    /// Credential id, the denylist key.
    pub jti: Uuid,
}

/// What a request handler gets after resolving a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl SessionIdentity {
    fn from_claims(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            session_id: claims.jti,
            expires_at: DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MintedSession {
    pub token: String,
    pub claims: SessionClaims,
}

/// Signing material and lifetime for session credentials.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn mint(
        &self,
        identity: &Identity,
        issued_at: DateTime<Utc>,
    ) -> Result<MintedSession, SessionError> {
        let claims = SessionClaims {
            sub: identity.id,
            email: identity.email.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(MintedSession { token, claims })
    }

    /// Checks signature, structure, and `now <= exp`. Expiry is evaluated against the
    /// supplied clock rather than the library's so resolution is deterministic.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionIdentity, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let claims = decode::<SessionClaims>(token.trim(), &self.decoding, &validation)?.claims;
        if now.timestamp() > claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(SessionIdentity::from_claims(claims))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Revocation denylist
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait RevocationList: Send + Sync {
    /// Denies `session_id` until `expires_at`.
    async fn revoke(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn is_revoked(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[derive(Default)]
pub struct MemoryRevocationList {
    denied: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl MemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, DateTime<Utc>>>, StoreError> {
        self.denied
            .lock()
            .map_err(|_| StoreError::Backend("revocation list lock poisoned".to_string()))
    }
}

#[async_trait]
impl RevocationList for MemoryRevocationList {
    async fn revoke(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.lock()?.insert(session_id, expires_at);
        Ok(())
    }

    async fn is_revoked(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .get(&session_id)
            .is_some_and(|expires_at| now <= *expires_at))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut denied = self.lock()?;
        let before = denied.len();
        denied.retain(|_, expires_at| now <= *expires_at);
        Ok(before - denied.len())
    }
}

/// Denylist entries under `session:revoked:{jti}`, expiring with the credential.
#[derive(Clone)]
pub struct RedisRevocationList {
    conn: MultiplexedConnection,
}

impl RedisRevocationList {
    pub async fn connect(client: &redis::Client) -> Result<Self, StoreError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    fn key(session_id: Uuid) -> String {
        format!("session:revoked:{session_id}")
    }
}

#[async_trait]
impl RevocationList for RedisRevocationList {
    async fn revoke(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let ttl = (expires_at - Utc::now()).num_seconds();
        if ttl <= 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(session_id), 1, ttl as u64)
            .await?;
        Ok(())
    }

    async fn is_revoked(&self, session_id: Uuid, _now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let revoked: bool = conn.exists(Self::key(session_id)).await?;
        Ok(revoked)
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(0)
    }
}
