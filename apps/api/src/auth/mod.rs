//! Email one-time-passcode authentication.
//!
//! Flow: request_otp(email) → handle; verify_otp(handle, code) → session credential + identity;
//! every authenticated request resolves its bearer credential back to an identity reference.
//!
//! OTP records and identities live behind injectable stores (`OtpStore`, `IdentityStore`),
//! so the same service runs against memory in tests and Redis/Postgres in production.

pub mod code;
pub mod email;
pub mod handlers;
pub mod identity;
pub mod otp;
pub mod service;
pub mod session;

pub use handlers::AuthUser;
pub use service::AuthService;

use thiserror::Error;

/// Domain errors of the auth core. The three OTP variants are kept apart for logging and
/// collapsed into one response at the HTTP boundary.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("OTP handle not found")]
    OtpNotFound,

    #[error("OTP expired")]
    OtpExpired,

    #[error("OTP code mismatch")]
    OtpMismatch,

    #[error("email delivery failed: {0}")]
    Delivery(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("unavailable: {0}")]
    Unavailable(String),
}
