use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Outbound email. Delivery failures are logged by callers, never surfaced
/// to the HTTP client.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, username: &str, link: &str) -> anyhow::Result<()>;
    async fn send_password_reset(&self, to: &str, link: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .context("smtp relay config")?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        let from = format!("{} <{}>", config.from_name, config.from);
        Ok(Self { transport, from })
    }

    async fn send_html(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("parse from address")?)
            .to(to.parse().context("parse recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .context("build message")?;
        self.transport.send(message).await.context("smtp send")?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, username: &str, link: &str) -> anyhow::Result<()> {
        let body = format!(
            "<p>Hi {username},</p>\
             <p>Welcome to Contactbook! Please confirm your email address:</p>\
             <p><a href=\"{link}\">Confirm email</a></p>"
        );
        self.send_html(to, "Confirm your email", body).await
    }

    async fn send_password_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
        let body = format!(
            "<p>We received a request to reset your password.</p>\
             <p><a href=\"{link}\">Reset password</a></p>\
             <p>If you did not request this, ignore this message.</p>"
        );
        self.send_html(to, "Reset your password", body).await
    }
}

/// Discards all mail. Used by `AppState::fake()`.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_verification(&self, _to: &str, _username: &str, _link: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_password_reset(&self, _to: &str, _link: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
