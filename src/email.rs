use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::EmailConfig;

/// Outbound mail, behind a trait so tests can swap in a no-op.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, reset_url: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        let mut mailer =
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?.port(self.config.smtp_port);

        if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer = mailer.credentials(Credentials::new(username.clone(), password.clone()));
        }

        mailer.build().send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, to: &str, reset_url: &str) -> anyhow::Result<()> {
        if !self.config.is_configured() {
            warn!(to = %to, "email not configured, skipping password reset email");
            return Ok(());
        }

        let body = format!(
            "We received a request to reset the password for this account.\n\n\
             Open the link below to choose a new password. The link expires in one hour.\n\n\
             {reset_url}\n\n\
             If you did not request a reset, you can ignore this email."
        );

        self.send(to, "Reset your password", body).await?;
        info!(to = %to, "password reset email sent");
        Ok(())
    }
}
