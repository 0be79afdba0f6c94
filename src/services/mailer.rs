//! Reset email delivery
//!
//! Three providers sit behind [`Mailer`]: the EmailJS REST API the dashboard
//! has always used, plain SMTP through lettre, and a log-only sink for
//! development.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{EmailConfig, EmailJsConfig, EmailProvider, SmtpConfig};

/// Content of a password reset email
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetEmail {
    pub to_email: String,
    pub username: String,
    pub reset_url: String,
}

impl ResetEmail {
    pub fn subject(&self, app_name: &str) -> String {
        format!("Reset your {} password", app_name)
    }

    pub fn text_body(&self, app_name: &str) -> String {
        format!(
            "Hello {},\n\n\
             We received a request to reset your {} password. \
             Open the link below within 24 hours to choose a new one:\n\n\
             {}\n\n\
             If you did not ask for this, you can ignore this email.\n",
            self.username, app_name, self.reset_url
        )
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn send_reset_email(&self, email: &ResetEmail) -> Result<()>;
}

/// Build the mailer selected in configuration
pub fn build_mailer(config: &EmailConfig, app_name: &str) -> Result<Arc<dyn Mailer>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let mailer: Arc<dyn Mailer> = match config.provider {
        EmailProvider::EmailJs => {
            let emailjs = config
                .emailjs
                .clone()
                .context("EmailJS provider selected without EmailJS settings")?;
            Arc::new(EmailJsMailer::new(emailjs, timeout)?)
        }
        EmailProvider::Smtp => {
            let smtp = config
                .smtp
                .as_ref()
                .context("SMTP provider selected without SMTP settings")?;
            Arc::new(SmtpMailer::new(smtp, app_name, timeout)?)
        }
        EmailProvider::Log => Arc::new(LogMailer),
    };

    info!(provider = mailer.provider(), "Mail delivery configured");
    Ok(mailer)
}

#[derive(Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: &'a ResetEmail,
}

/// EmailJS REST client
pub struct EmailJsMailer {
    client: Client,
    config: EmailJsConfig,
}

impl EmailJsMailer {
    pub fn new(config: EmailJsConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for EmailJsMailer {
    fn provider(&self) -> &'static str {
        "emailjs"
    }

    async fn send_reset_email(&self, email: &ResetEmail) -> Result<()> {
        let body = EmailJsRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            access_token: self.config.private_key.as_deref(),
            template_params: email,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&body)
            .send()
            .await
            .context("Failed to reach EmailJS")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("EmailJS rejected the message ({}): {}", status, text);
        }

        debug!(provider = "emailjs", "Reset email accepted");
        Ok(())
    }
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    app_name: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, app_name: &str, timeout: Duration) -> Result<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .with_context(|| format!("Invalid SMTP relay host: {}", config.host))?;

        let mut builder = builder.port(config.port).timeout(Some(timeout));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("Invalid SMTP from address: {}", config.from))?;

        Ok(Self {
            transport: builder.build(),
            from,
            app_name: app_name.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn provider(&self) -> &'static str {
        "smtp"
    }

    async fn send_reset_email(&self, email: &ResetEmail) -> Result<()> {
        let to: Mailbox = email
            .to_email
            .parse()
            .context("Invalid recipient address")?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject(&self.app_name))
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body(&self.app_name))
            .context("Failed to build reset email")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        debug!(provider = "smtp", "Reset email accepted");
        Ok(())
    }
}

/// Development sink: records that an email would have gone out
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn provider(&self) -> &'static str {
        "log"
    }

    async fn send_reset_email(&self, email: &ResetEmail) -> Result<()> {
        info!(
            to = %email.to_email,
            username = %email.username,
            "Reset email not delivered (log provider)"
        );
        Ok(())
    }
}
