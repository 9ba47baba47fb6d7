use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::session::SessionIdentity;
use crate::errors::AppError;
use crate::models::identity::Identity;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct RequestOtpResponse {
    pub handle: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Seconds until the code stops being accepted.
    pub expires_in: i64,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub handle: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifyOtpResponse {
    pub session_credential: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub identity: Identity,
}

/// POST /api/v1/auth/request-otp
pub async fn handle_request_otp(
    State(state): State<AppState>,
    Json(req): Json<RequestOtpRequest>,
) -> Result<Json<RequestOtpResponse>, AppError> {
    let issued = state.auth.request_otp(&req.email).await?;
    Ok(Json(RequestOtpResponse {
        handle: issued.handle,
        expires_at: issued.expires_at,
        expires_in: state.auth.otp_ttl().num_seconds(),
    }))
}

/// POST /api/v1/auth/verify-otp
pub async fn handle_verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, AppError> {
    let verified = state.auth.verify_otp(&req.handle, &req.code).await?;
    let claims = &verified.session.claims;
    Ok(Json(VerifyOtpResponse {
        expires_in: claims.exp - claims.iat,
        session_credential: verified.session.token,
        token_type: "Bearer",
        identity: verified.identity,
    }))
}

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: Identity,
    pub session_expires_at: DateTime<Utc>,
}

/// GET /api/v1/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    // A valid credential whose identity no longer exists is treated like any bad credential.
    let identity = state
        .auth
        .find_identity(session.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(MeResponse {
        identity,
        session_expires_at: session.expires_at,
    }))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> Result<StatusCode, AppError> {
    state.auth.logout(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's resolved session. Rejects with `Unauthorized` unless the request carries
/// `Authorization: Bearer <credential>` that resolves.
pub struct AuthUser(pub SessionIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let credential = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_credential)
            .ok_or(AppError::Unauthorized)?;

        let session = state.auth.resolve_session(credential).await?;
        Ok(AuthUser(session))
    }
}

fn bearer_credential(header_value: &str) -> Option<&str> {
    let (scheme, credential) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}
