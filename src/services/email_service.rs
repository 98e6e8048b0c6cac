use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::errors::{AppError, Result};

/// Outbound notification channel. Plain-text body is mandatory, HTML is an
/// optional alternative part.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<String>,
    ) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        smtp_host: &str,
        smtp_username: &str,
        smtp_password: &str,
        from_email: &str,
    ) -> Result<Self> {
        let creds = Credentials::new(smtp_username.to_string(), smtp_password.to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| AppError::configuration(format!("Invalid SMTP relay {}: {}", smtp_host, e)))?
            .credentials(creds)
            .build();

        let from = from_email
            .parse()
            .map_err(|e| AppError::configuration(format!("Invalid FROM_EMAIL {}: {}", from_email, e)))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<String>,
    ) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| AppError::dispatch(format!("Invalid recipient address: {}", to)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject);

        let email = match html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                text_body.to_string(),
                html,
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text_body.to_string()),
        }
        .map_err(|e| AppError::dispatch(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::dispatch(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }
}
