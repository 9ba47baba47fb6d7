//! The auth core: issues and redeems one-time codes, mints and resolves session credentials.
//!
//! Every store call is bounded by `store_timeout` and every email send by `email_timeout`.
//! Nothing is committed before a timeout boundary except the OTP insert, which is rolled
//! back when delivery fails, and identity creation, which is idempotent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use subtle::ConstantTimeEq;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::code::{generate_code, generate_handle, is_well_formed_code, CODE_LENGTH};
use crate::auth::email::{is_valid_email, normalize_email};
use crate::auth::identity::IdentityStore;
use crate::auth::otp::{OtpRecord, OtpStore};
use crate::auth::session::{MintedSession, RevocationList, SessionIdentity, SessionKeys};
use crate::auth::AuthError;
use crate::mailer::Mailer;
use crate::models::identity::Identity;
use crate::storage::StoreError;

/// Pluggable collaborators of the auth core.
pub struct AuthBackends {
    pub otps: Arc<dyn OtpStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub revocations: Arc<dyn RevocationList>,
    pub mailer: Arc<dyn Mailer>,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub otp_ttl: Duration,
    pub store_timeout: StdDuration,
    pub email_timeout: StdDuration,
}

/// Result of a successful OTP request. Deliberately carries neither code nor email.
#[derive(Debug, Clone)]
pub struct OtpIssued {
    pub handle: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Verified {
    pub session: MintedSession,
    pub identity: Identity,
}

pub struct AuthService {
    otps: Arc<dyn OtpStore>,
    identities: Arc<dyn IdentityStore>,
    revocations: Arc<dyn RevocationList>,
    mailer: Arc<dyn Mailer>,
    keys: SessionKeys,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(backends: AuthBackends, keys: SessionKeys, settings: AuthSettings) -> Self {
        Self {
            otps: backends.otps,
            identities: backends.identities,
            revocations: backends.revocations,
            mailer: backends.mailer,
            keys,
            settings,
        }
    }

    pub fn otp_ttl(&self) -> Duration {
        self.settings.otp_ttl
    }

    pub async fn request_otp(&self, email: &str) -> Result<OtpIssued, AuthError> {
        self.request_otp_at(email, Utc::now()).await
    }

    /// Stores a fresh record, then dispatches the code. Earlier handles for the same
    /// address are left untouched and stay redeemable until their own expiry.
    pub async fn request_otp_at(
        &self,
        raw_email: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpIssued, AuthError> {
        let email = normalize_email(raw_email);
        if !is_valid_email(&email) {
            return Err(AuthError::Validation(
                "email must be a valid email address".to_string(),
            ));
        }

        let record = OtpRecord {
            handle: generate_handle(),
            email,
            code: generate_code(),
            expires_at: now + self.settings.otp_ttl,
        };
        self.store("otp insert", self.otps.insert(&record)).await?;

        if let Err(reason) = self.dispatch(&record).await {
            self.discard(record.handle).await;
            return Err(AuthError::Delivery(reason));
        }

        info!(handle = %record.handle, "OTP issued");
        Ok(OtpIssued {
            handle: record.handle,
            expires_at: record.expires_at,
        })
    }

    pub async fn verify_otp(&self, handle: &str, code: &str) -> Result<Verified, AuthError> {
        self.verify_otp_at(handle, code, Utc::now()).await
    }

    /// Redeems a code. A wrong code leaves the record in place; an expired one is removed.
    /// The store's `delete` is the last step and picks the single winner among concurrent
    /// correct submissions.
    pub async fn verify_otp_at(
        &self,
        handle: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Verified, AuthError> {
        let code = code.trim();
        if !is_well_formed_code(code) {
            return Err(AuthError::Validation(format!(
                "code must be exactly {CODE_LENGTH} digits"
            )));
        }
        let handle = Uuid::parse_str(handle.trim()).map_err(|_| AuthError::OtpNotFound)?;

        let record = self
            .store("otp lookup", self.otps.get(handle))
            .await?
            .ok_or(AuthError::OtpNotFound)?;

        if record.is_expired(now) {
            self.discard(handle).await;
            return Err(AuthError::OtpExpired);
        }

        if !bool::from(code.as_bytes().ct_eq(record.code.as_bytes())) {
            return Err(AuthError::OtpMismatch);
        }

        // Everything that can fail runs before the consuming delete, so an Unavailable
        // leaves the record redeemable. get_or_create is idempotent per email, so a
        // request that then loses the delete has only re-read the same identity.
        let identity = self
            .store(
                "identity get_or_create",
                self.identities.get_or_create(&record.email, now),
            )
            .await?;

        let session = self.keys.mint(&identity, now).map_err(|e| {
            error!("Failed to sign session credential: {e}");
            AuthError::Unavailable("credential signing failed".to_string())
        })?;

        if !self.store("otp consume", self.otps.delete(handle)).await? {
            // Another request consumed this handle between our read and delete.
            return Err(AuthError::OtpNotFound);
        }

        info!(identity_id = %identity.id, "OTP verified, session issued");
        Ok(Verified { session, identity })
    }

    pub async fn resolve_session(&self, credential: &str) -> Result<SessionIdentity, AuthError> {
        self.resolve_session_at(credential, Utc::now()).await
    }

    /// Every structural, signature, expiry, or revocation failure is the same `Unauthorized`.
    pub async fn resolve_session_at(
        &self,
        credential: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionIdentity, AuthError> {
        let session = self.keys.verify(credential, now).map_err(|e| {
            debug!("Session credential rejected: {e}");
            AuthError::Unauthorized
        })?;

        let revoked = self
            .store(
                "revocation lookup",
                self.revocations.is_revoked(session.session_id, now),
            )
            .await?;
        if revoked {
            debug!(identity_id = %session.id, "Revoked session credential presented");
            return Err(AuthError::Unauthorized);
        }

        Ok(session)
    }

    pub async fn logout(&self, session: &SessionIdentity) -> Result<(), AuthError> {
        self.store(
            "revocation insert",
            self.revocations.revoke(session.session_id, session.expires_at),
        )
        .await?;
        info!(identity_id = %session.id, "Session revoked");
        Ok(())
    }

    pub async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, AuthError> {
        self.store("identity lookup", self.identities.find_by_id(id))
            .await
    }

    /// Housekeeping: drops expired OTP records and denylist entries.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<(usize, usize), AuthError> {
        let otps = self
            .store("otp purge", self.otps.purge_expired(now))
            .await?;
        let revocations = self
            .store("revocation purge", self.revocations.purge_expired(now))
            .await?;
        Ok((otps, revocations))
    }

    async fn dispatch(&self, record: &OtpRecord) -> Result<(), String> {
        match timeout(
            self.settings.email_timeout,
            self.mailer.send_code(&record.email, &record.code),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timed out after {:?}",
                self.settings.email_timeout
            )),
        }
    }

    /// Best-effort removal. A failure only leaves a record that will expire on its own.
    async fn discard(&self, handle: Uuid) {
        if let Err(e) = self.store("otp discard", self.otps.delete(handle)).await {
            warn!(%handle, "Failed to discard OTP record: {e}");
        }
    }

    async fn store<T, F>(&self, op: &str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match timeout(self.settings.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AuthError::Unavailable(format!("{op}: {e}"))),
            Err(_) => Err(AuthError::Unavailable(format!(
                "{op}: timed out after {:?}",
                self.settings.store_timeout
            ))),
        }
    }
}
