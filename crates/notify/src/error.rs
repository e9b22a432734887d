//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur when sending notifications.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// SMTP transport failed (connect, TLS, auth or delivery)
    #[error("SMTP transport failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Sender or recipient address could not be parsed
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Message could not be assembled
    #[error("Failed to build email message: {0}")]
    Message(#[from] lettre::error::Error),

    /// Channel is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    /// Send did not finish within the configured timeout
    #[error("Send timed out after {0}s")]
    Timeout(u64),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while loading channel configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing
    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),

    /// A value could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    /// Secrets file could not be read
    #[error("Failed to read secrets file: {0}")]
    Io(#[from] std::io::Error),

    /// Secrets file is not valid YAML for the expected keys
    #[error("Failed to parse secrets file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
