//! Outgoing e-mail delivery.

use std::sync::Arc;
use std::time::Duration;

use enrollo_common::{
    AppError, AppResult,
    config::{EmailConfig, EmailProviderConfig},
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use serde::Serialize;

use super::upstream::{status_error, transport_error};

const RESEND_API_URL: &str = "https://api.resend.com";
/// Largest batch the Resend batch endpoint accepts.
const RESEND_BATCH_LIMIT: usize = 100;

/// An HTML e-mail to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// E-mail delivery collaborator.
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    /// Sender address, also exposed to templates.
    fn from_address(&self) -> &str;

    /// Send one message.
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()>;

    /// Send several messages.
    async fn send_batch(&self, emails: &[OutgoingEmail]) -> AppResult<()> {
        for email in emails {
            self.send(email).await?;
        }
        Ok(())
    }
}

/// Build the configured sender.
pub fn sender_from_config(config: &EmailConfig) -> AppResult<Arc<dyn EmailSender>> {
    match &config.provider {
        EmailProviderConfig::Resend { api_key } => Ok(Arc::new(ResendSender::new(
            api_key.clone(),
            config.from_address.clone(),
        )?)),
        EmailProviderConfig::Smtp {
            host,
            port,
            username,
            password,
        } => Ok(Arc::new(SmtpSender::new(
            host,
            *port,
            username.clone().zip(password.clone()),
            &config.from_address,
        )?)),
    }
}

#[derive(Serialize)]
struct ResendMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Resend HTTP API sender.
pub struct ResendSender {
    http_client: reqwest::Client,
    api_key: String,
    from_address: String,
}

impl ResendSender {
    /// Create a new Resend sender.
    pub fn new(api_key: String, from_address: String) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_key,
            from_address,
        })
    }

    fn message<'a>(&'a self, email: &'a OutgoingEmail) -> ResendMessage<'a> {
        ResendMessage {
            from: &self.from_address,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        }
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> AppResult<()> {
        let response = self
            .http_client
            .post(format!("{RESEND_API_URL}{path}"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error("Resend", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Resend", status, &body));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EmailSender for ResendSender {
    fn from_address(&self) -> &str {
        &self.from_address
    }

    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        self.post("/emails", &self.message(email)).await
    }

    async fn send_batch(&self, emails: &[OutgoingEmail]) -> AppResult<()> {
        for chunk in emails.chunks(RESEND_BATCH_LIMIT) {
            let batch: Vec<ResendMessage<'_>> = chunk.iter().map(|e| self.message(e)).collect();
            self.post("/emails/batch", &batch).await?;
        }
        Ok(())
    }
}

/// SMTP relay sender.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    from_address: String,
}

impl SmtpSender {
    /// Create a STARTTLS relay sender.
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from_address: &str,
    ) -> AppResult<Self> {
        let from: Mailbox = from_address
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid from address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?
            .port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl EmailSender for SmtpSender {
    fn from_address(&self) -> &str {
        &self.from_address
    }

    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid recipient {}: {e}", email.to)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())
            .map_err(|e| AppError::Internal(format!("Failed to build e-mail: {e}")))?;

        self.transport.send(message).await.map_err(|e| {
            if e.is_transient() {
                AppError::ServiceUnavailable(format!("SMTP: {e}"))
            } else {
                AppError::ExternalService(format!("SMTP: {e}"))
            }
        })?;
        Ok(())
    }
}
