//! Outgoing notifications

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("failed to send email: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("mail delivery rejected: {0}")]
    Rejected(String),
}

/// Notification sink for user-facing email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// SMTP relay mailer
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.from.parse()?;
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        self.transport.send(email).await?;
        info!("Sent \"{}\" to {}", subject, to);
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        info!(to, subject, body = html, "Email not delivered (no SMTP relay configured)");
        Ok(())
    }
}

/// A message captured by [`RecordingMailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Keeps every message in memory; optionally rejects them all
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
    reject: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        if self.reject {
            return Err(MailError::Rejected(format!("refusing mail to {}", to)));
        }

        self.sent.lock().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_mailer_captures() {
        let mailer = RecordingMailer::new();
        mailer.send("a@x.com", "hi", "<p>hi</p>").await.unwrap();

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
    }

    #[tokio::test]
    async fn test_rejecting_mailer_fails() {
        let mailer = RecordingMailer::rejecting();
        assert!(mailer.send("a@x.com", "hi", "").await.is_err());
        assert!(mailer.sent().await.is_empty());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_sender() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from: "not a mailbox".to_string(),
        };
        assert!(matches!(SmtpMailer::new(&config), Err(MailError::Address(_))));
    }
}
