use anyhow::{Context, Result};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;

/// Outgoing mail over SMTP. Absent when `SMTP_HOST` is unset.
#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    app_url: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from", &self.from.to_string())
            .field("app_url", &self.app_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig, app_url: &str) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP host {}", config.host))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .from_address
            .parse()
            .with_context(|| format!("Invalid SMTP_FROM address {}", config.from_address))?;

        Ok(Self {
            transport: builder.build(),
            from,
            app_url: app_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn send(&self, to: &str, content: EmailContent) -> Result<()> {
        let recipient: Mailbox = to
            .parse()
            .with_context(|| format!("Invalid recipient address {}", to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(content.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(content.body)
            .context("Failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        info!(to, subject = %content.subject, "Email sent");
        Ok(())
    }

    pub fn invitation(&self, client_name: &str, coach_name: &str) -> EmailContent {
        invitation_email(&self.app_url, client_name, coach_name)
    }
}

pub fn invitation_email(app_url: &str, client_name: &str, coach_name: &str) -> EmailContent {
    EmailContent {
        subject: format!("{} invited you to train together", coach_name),
        body: format!(
            "Hi {},\n\n{} has added you as a client. Sign in at {}/signin to see your \
             programs, lessons and messages.\n",
            client_name, coach_name, app_url
        ),
    }
}
