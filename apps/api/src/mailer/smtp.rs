use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::{CodeEmail, MailError, Mailer};
use crate::config::SmtpConfig;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    valid_minutes: i64,
}

impl SmtpMailer {
    /// Port 465 uses implicit TLS, anything else negotiates STARTTLS.
    pub fn new(config: &SmtpConfig, valid_minutes: i64) -> Result<Self, MailError> {
        let tls = TlsParameters::new(config.host.clone())
            .map_err(|e| MailError::InvalidConfig(format!("TLS configuration error: {e}")))?;

        let mut builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                .port(config.port)
                .tls(Tls::Wrapper(tls))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                .port(config.port)
                .tls(Tls::Required(tls))
        };

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from_raw = match &config.from_name {
            Some(name) => format!("{name} <{}>", config.from_address),
            None => config.from_address.clone(),
        };
        let from = from_raw
            .parse::<Mailbox>()
            .map_err(|e| MailError::InvalidConfig(format!("Invalid from address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
            valid_minutes,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_code(&self, to: &str, code: &str) -> Result<(), MailError> {
        let content = CodeEmail::new(code, self.valid_minutes);
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| MailError::SendFailed(format!("Invalid recipient: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(content.subject)
            .multipart(MultiPart::alternative_plain_html(content.text, content.html))
            .map_err(|e| MailError::SendFailed(format!("Failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;
        Ok(())
    }
}
