use std::sync::Arc;

use async_trait::async_trait;
use lettre::{message::header::ContentType, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::{EmailBackend, EmailConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("mail delivery failed: {0}")]
    SendFailed(String),
}

/// Outbound e-mail collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Plain-text delivery over SMTP without TLS (local relays such as Mailpit).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, from_address: impl Into<String>) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();
        Self { transport, from_address: from_address.into() }
    }
}

fn mailbox(address: &str) -> Result<lettre::message::Mailbox, MailError> {
    address.parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let message = Message::builder()
            .from(mailbox(&self.from_address)?)
            .to(mailbox(&email.to)?)
            .subject(&email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        tracing::info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Logs instead of delivering. Used in development and when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, body = %email.body, "email not delivered (log backend)");
        Ok(())
    }
}

pub fn from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    match config.backend {
        EmailBackend::Smtp => Arc::new(SmtpMailer::new(&config.smtp_host, config.smtp_port, config.from_address.clone())),
        EmailBackend::Log => Arc::new(LogMailer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailers_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SmtpMailer>();
        assert_send_sync::<LogMailer>();
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        let email = Email {
            to: "test@example.com".to_string(),
            subject: "Your password reset token (valid for 10 min)".to_string(),
            body: "reset".to_string(),
        };
        assert!(LogMailer.send(email).await.is_ok());
    }

    #[tokio::test]
    async fn smtp_rejects_bad_recipient_before_connecting() {
        let mailer = SmtpMailer::new("localhost", 1025, "noreply@example.com");
        let email = Email { to: "not an address".to_string(), subject: "s".to_string(), body: "b".to_string() };
        assert!(matches!(mailer.send(email).await, Err(MailError::Address { .. })));
    }
}
