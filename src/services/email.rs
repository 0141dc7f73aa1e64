//! Confirmation email delivery.
//!
//! Two transports: SMTP via lettre for self-hosted setups, Resend for
//! hosted ones. Which one runs is decided once at startup from the
//! configuration.

use anyhow::{Result, bail};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{AsyncTransport, Message, Tokio1Executor};
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str)
    -> Result<()>;
}

pub enum EmailSenderImpl {
    Smtp(SmtpSender),
    Resend(ResendSender),
}

impl EmailSenderImpl {
    /// Picks a transport from the configuration. Resend wins when both are
    /// set.
    pub fn new(
        from: &str,
        resend_api_key: Option<String>,
        smtp_url: Option<String>,
    ) -> Result<Self> {
        let from: Mailbox = from.parse()?;

        if let Some(key) = resend_api_key {
            if !key.is_empty() {
                return Ok(Self::Resend(ResendSender::new(&key, from)));
            }
        }
        if let Some(url) = smtp_url {
            if !url.is_empty() {
                return Ok(Self::Smtp(SmtpSender::new(&url, from)?));
            }
        }
        bail!("Either LISTGATE_RESEND_API_KEY or LISTGATE_SMTP_URL must be configured")
    }
}

#[async_trait::async_trait]
impl EmailSender for EmailSenderImpl {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<()> {
        match self {
            Self::Smtp(sender) => sender.send(to, subject, text_body, html_body).await,
            Self::Resend(sender) => sender.send(to, subject, text_body, html_body).await,
        }
    }
}

pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(url: &str, from: Mailbox) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(url)?.build();
        Ok(Self { transport, from })
    }

    async fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text_body.to_string(),
                html_body.to_string(),
            ))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

pub struct ResendSender {
    client: Resend,
    from: Mailbox,
}

impl ResendSender {
    pub fn new(api_key: &str, from: Mailbox) -> Self {
        Self {
            client: Resend::new(api_key),
            from,
        }
    }

    async fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str) -> Result<()> {
        let email = CreateEmailBaseOptions::new(self.from.to_string(), [to], subject)
            .with_text(text_body)
            .with_html(html_body);

        self.client.emails.send(email).await?;
        Ok(())
    }
}
