//! Outgoing mail.
//!
//! [`SmtpMailer`] relays through an SMTP server with lettre. Without SMTP
//! configuration every send fails with [`MailError::NotConfigured`], unless
//! `mail_outbox` opts into [`OutboxMailer`], which keeps the last
//! [`OUTBOX_CAPACITY`] messages in memory and logs only recipient and
//! subject.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("No mail transport configured")]
    NotConfigured,
}

pub type MailResult<T> = Result<T, MailError>;

/// Something that can deliver a plain-text email.
pub trait MailTransport: Send + Sync {
    /// Resolves once the transport has accepted the message.
    fn send(&self, to: &str, subject: &str, body: &str) -> impl Future<Output = MailResult<()>> + Send;
}

// =============================================================================
// SMTP
// =============================================================================

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds a relay transport. Nothing is sent until the first message.
    pub fn new(host: &str, port: u16, username: String, password: String, from: &str) -> MailResult<Self> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("{from}: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| MailError::Delivery(format!("SMTP relay error: {e}")))?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();

        info!(host = %host, port, "SMTP mailer configured");
        Ok(SmtpMailer { transport, from })
    }
}

impl MailTransport for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> MailResult<()> {
        let message = build_message(self.from.clone(), to, subject, body)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        debug!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

fn build_message(from: Mailbox, to: &str, subject: &str, body: &str) -> MailResult<Message> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| MailError::InvalidAddress(format!("{to}: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MailError::Build(e.to_string()))
}

// =============================================================================
// Outbox
// =============================================================================

/// A message captured by [`OutboxMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Messages an [`OutboxMailer`] keeps before dropping the oldest.
pub const OUTBOX_CAPACITY: usize = 50;

/// In-memory mailer for development and tests.
#[derive(Debug, Clone, Default)]
pub struct OutboxMailer {
    sent: Arc<Mutex<VecDeque<OutgoingMail>>>,
    failing: bool,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails, for exercising delivery errors.
    pub fn failing() -> Self {
        OutboxMailer {
            failing: true,
            ..Self::default()
        }
    }

    /// Retained messages, oldest first.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent
            .lock()
            .map(|sent| sent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent message to `to`.
    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to)
    }
}

impl MailTransport for OutboxMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> MailResult<()> {
        if self.failing {
            return Err(MailError::Delivery("outbox is configured to fail".to_string()));
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|_| MailError::Delivery("outbox lock poisoned".to_string()))?;
        if sent.len() >= OUTBOX_CAPACITY {
            sent.pop_front();
        }
        sent.push_back(OutgoingMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });

        info!(to = %to, subject = %subject, "Email stored in outbox");
        Ok(())
    }
}

// =============================================================================
// Configured mailer
// =============================================================================

#[derive(Clone)]
pub enum Mailer {
    Smtp(SmtpMailer),
    Outbox(OutboxMailer),
    /// Neither SMTP nor the outbox is configured.
    Disabled,
}

impl MailTransport for Mailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> MailResult<()> {
        match self {
            Mailer::Smtp(mailer) => mailer.send(to, subject, body).await,
            Mailer::Outbox(mailer) => mailer.send(to, subject, body).await,
            Mailer::Disabled => Err(MailError::NotConfigured),
        }
    }
}
