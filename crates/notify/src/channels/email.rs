//! SMTP email notification channel.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ChannelError, ConfigError};
use crate::events::NotifyEvent;
use crate::NotifyChannel;

/// Default bound on a single SMTP send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Display name used in the `From` header.
const SENDER_NAME: &str = "Slot Monitor";

const ENV_SMTP_HOST: &str = "SMTP_HOST";
const ENV_SMTP_PORT: &str = "SMTP_PORT";
const ENV_SMTP_USERNAME: &str = "SMTP_USERNAME";
const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";
const ENV_SMTP_TO: &str = "SMTP_TO";
const ENV_SMTP_TLS: &str = "SMTP_TLS";

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS, usually port 465).
    #[default]
    Implicit,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
}

impl TlsMode {
    /// Conventional port for this mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Implicit => 465,
            Self::StartTls => 587,
        }
    }
}

impl FromStr for TlsMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "implicit" | "ssl" | "tls" | "smtps" => Ok(Self::Implicit),
            "starttls" => Ok(Self::StartTls),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_SMTP_TLS,
                value: s.to_string(),
            }),
        }
    }
}

/// SMTP account and delivery settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Login username, also used as the sender address.
    pub username: String,
    /// Login password or app password.
    pub password: String,
    /// Recipient address.
    pub to: String,
    /// Connection security.
    pub tls: TlsMode,
    /// Upper bound on a single send.
    pub send_timeout: Duration,
}

/// Layout of the YAML secrets file.
#[derive(Debug, Deserialize)]
struct SecretsFile {
    smtp_server: String,
    smtp_port: u16,
    sender_email: String,
    sender_password: String,
    #[serde(default)]
    recipient_email: Option<String>,
    #[serde(default)]
    smtp_tls: Option<String>,
}

impl SmtpConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when `SMTP_HOST` is unset, which means email is off.
    ///
    /// # Environment Variables
    /// - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`
    /// - `SMTP_PORT` (default: 465 or 587 depending on `SMTP_TLS`)
    /// - `SMTP_TLS`: `implicit` (default) or `starttls`
    /// - `SMTP_TO`: recipient (default: the sender)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(host) = std::env::var(ENV_SMTP_HOST) else {
            debug!("Email notifications disabled (SMTP_HOST not set)");
            return Ok(None);
        };

        let username =
            std::env::var(ENV_SMTP_USERNAME).map_err(|_| ConfigError::MissingEnv(ENV_SMTP_USERNAME))?;
        let password =
            std::env::var(ENV_SMTP_PASSWORD).map_err(|_| ConfigError::MissingEnv(ENV_SMTP_PASSWORD))?;

        let tls = match std::env::var(ENV_SMTP_TLS) {
            Ok(v) => v.parse()?,
            Err(_) => TlsMode::default(),
        };

        let port = match std::env::var(ENV_SMTP_PORT) {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SMTP_PORT,
                value: v,
            })?,
            Err(_) => tls.default_port(),
        };

        let to = std::env::var(ENV_SMTP_TO).ok();

        Ok(Some(Self::new(host, port, username, password, to, tls)))
    }

    /// Load configuration from a YAML secrets file.
    ///
    /// Expected keys: `smtp_server`, `smtp_port`, `sender_email`,
    /// `sender_password`, and optionally `recipient_email` and `smtp_tls`.
    pub fn from_secrets_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let secrets: SecretsFile = serde_yaml::from_str(&content)?;

        let tls = match secrets.smtp_tls.as_deref() {
            Some(v) => v.parse()?,
            None => TlsMode::default(),
        };

        Ok(Self::new(
            secrets.smtp_server,
            secrets.smtp_port,
            secrets.sender_email,
            secrets.sender_password,
            secrets.recipient_email,
            tls,
        ))
    }

    fn new(
        host: String,
        port: u16,
        username: String,
        password: String,
        to: Option<String>,
        tls: TlsMode,
    ) -> Self {
        // Mail goes to the sender when no recipient is given.
        let to = to
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| username.clone());

        Self {
            host,
            port,
            username,
            password,
            to,
            tls,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Override the per-send timeout.
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}

/// SMTP email notification channel.
pub struct EmailChannel {
    config: SmtpConfig,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailChannel {
    /// Create an email channel, preparing (but not opening) the SMTP transport.
    pub fn new(config: SmtpConfig) -> Result<Self, ChannelError> {
        if config.host.trim().is_empty() {
            return Err(ChannelError::NotConfigured("SMTP host is empty".to_string()));
        }

        let builder = match config.tls {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?,
        };

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = builder
            .port(config.port)
            .credentials(creds)
            .timeout(Some(config.send_timeout))
            .build();

        info!(
            host = %config.host,
            port = config.port,
            to = %config.to,
            "Email notifications enabled"
        );

        Ok(Self { config, mailer })
    }

    /// Build the plain-text message for an event.
    fn build_message(config: &SmtpConfig, event: &NotifyEvent) -> Result<Message, ChannelError> {
        let from = Mailbox::new(
            Some(SENDER_NAME.to_string()),
            config.username.parse::<Address>()?,
        );
        let to = Mailbox::new(None, config.to.parse::<Address>()?);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(event.title())
            .date(event.timestamp().into())
            .header(ContentType::TEXT_PLAIN)
            .body(event.body())?;

        Ok(message)
    }
}

#[async_trait]
impl NotifyChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let message = Self::build_message(&self.config, event)?;

        debug!(
            channel = "email",
            severity = event.severity().as_str(),
            subject = %event.title(),
            "Sending notification"
        );

        let timeout = self.config.send_timeout;
        tokio::time::timeout(timeout, self.mailer.send(message))
            .await
            .map_err(|_| ChannelError::Timeout(timeout.as_secs()))??;

        info!(
            to = %self.config.to,
            subject = %event.title(),
            "Email sent successfully"
        );

        Ok(())
    }
}
