//! Delivery of one-time codes.

mod smtp;
mod template;

pub use smtp::SmtpMailer;
pub use template::CodeEmail;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to send email: {0}")]
    SendFailed(String),

    #[error("invalid mail configuration: {0}")]
    InvalidConfig(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(&self, to: &str, code: &str) -> Result<(), MailError>;
}

/// Development mailer: writes the code to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_code(&self, to: &str, code: &str) -> Result<(), MailError> {
        info!(to, code, "SMTP not configured, login code logged instead of sent");
        Ok(())
    }
}
