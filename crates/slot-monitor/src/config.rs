//! Monitor configuration.

use std::str::FromStr;
use std::time::Duration;

use notify::RetryPolicy;

use crate::error::ConfigError;

/// Booking site polled by default.
pub const DEFAULT_URL: &str = "https://fcbooking.cse.hku.hk/";

/// Seconds between monitoring cycles.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Seconds an alert waits for acknowledgement before re-arming.
pub const DEFAULT_ALERT_WINDOW_SECS: u64 = 300;

/// Seconds before a page fetch is abandoned.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Email send attempts before the email channel is disabled.
pub const DEFAULT_EMAIL_ATTEMPTS: u32 = 3;

/// Seconds between email attempts.
pub const DEFAULT_EMAIL_BACKOFF_SECS: u64 = 10;

/// Seconds before a single email send is abandoned.
pub const DEFAULT_EMAIL_TIMEOUT_SECS: u64 = 15;

/// A venue section on the booking page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Venue {
    /// Display name, used as the first slot identity component.
    pub name: String,
    /// `id` attribute of the `div` holding this venue's schedule.
    pub section_id: String,
}

impl Venue {
    #[must_use]
    pub fn new(name: &str, section_id: &str) -> Self {
        Self {
            name: name.to_string(),
            section_id: section_id.to_string(),
        }
    }

    /// Venues listed on the booking site.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("CSE Active", "c10001Content"),
            Self::new("HKU B-Active", "c10002Content"),
        ]
    }
}

impl FromStr for Venue {
    type Err = ConfigError;

    /// Parse `Name=section-id`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, section_id) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidVenue(s.to_string()))?;
        let (name, section_id) = (name.trim(), section_id.trim());

        if name.is_empty() || section_id.is_empty() || name.contains(crate::slot::ID_SEPARATOR) {
            return Err(ConfigError::InvalidVenue(s.to_string()));
        }

        Ok(Self::new(name, section_id))
    }
}

/// Everything the monitor needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Booking page URL.
    pub url: String,
    /// Venue sections to extract.
    pub venues: Vec<Venue>,
    /// Wait between monitoring cycles.
    pub refresh_interval: Duration,
    /// How long an alert waits for acknowledgement.
    pub alert_window: Duration,
    /// Upper bound on one page fetch.
    pub fetch_timeout: Duration,
    /// Email retry behaviour.
    pub email_retry: RetryPolicy,
    /// Upper bound on one email send.
    pub email_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            venues: Venue::defaults(),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            alert_window: Duration::from_secs(DEFAULT_ALERT_WINDOW_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            email_retry: RetryPolicy {
                max_attempts: DEFAULT_EMAIL_ATTEMPTS,
                backoff: Duration::from_secs(DEFAULT_EMAIL_BACKOFF_SECS),
            },
            email_timeout: Duration::from_secs(DEFAULT_EMAIL_TIMEOUT_SECS),
        }
    }
}

impl MonitorConfig {
    /// Reject settings that would make the loop spin or alerts vanish instantly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("refresh interval"));
        }
        if self.alert_window.is_zero() {
            return Err(ConfigError::ZeroDuration("alert window"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("fetch timeout"));
        }
        if self.email_retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.email_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("email timeout"));
        }
        Ok(())
    }
}
