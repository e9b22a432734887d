//! Notification event types for slot monitoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity levels for alerts and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - normal operations
    Info,
    /// Warning - something needs attention
    Warning,
    /// Critical - immediate action required
    Critical,
}

impl Severity {
    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

/// Events that can trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// A monitored slot changed from full to available
    SlotAvailable {
        /// Serialized slot identity (`venue|date|time`).
        slot_id: String,
        /// Human readable label (`venue - date - time`).
        label: String,
        /// Raw status text from the booking page.
        status: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// A channel gave up after exhausting its retries and is now disabled
    ChannelDisabled {
        channel: String,
        attempts: u32,
        error: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// Manual test message
    Test {
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl NotifyEvent {
    /// Build a slot availability event stamped with the current time.
    #[must_use]
    pub fn slot_available(
        slot_id: impl Into<String>,
        label: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self::SlotAvailable {
            slot_id: slot_id.into(),
            label: label.into(),
            status: status.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get a short title for this event type.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::SlotAvailable { label, .. } => format!("Slot Available: {label}"),
            Self::ChannelDisabled { channel, .. } => format!("Notifications Disabled: {channel}"),
            Self::Test { .. } => "Slot Monitor Test Message".to_string(),
        }
    }

    /// Get the plain-text body for this event.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::SlotAvailable { label, status, .. } => format!(
                "A spot has opened up for:\n\n{label}\n\nCurrent availability: {status}\n\n\
                 Acknowledge the alert in the monitor to stop tracking this slot."
            ),
            Self::ChannelDisabled {
                channel,
                attempts,
                error,
                ..
            } => format!(
                "{channel} notifications failed {attempts} times and are disabled for this session.\n\
                 Last error: {error}"
            ),
            Self::Test { .. } => {
                "This is a test message from the slot monitor.\n\
                 If you are reading this, email delivery is configured correctly."
                    .to_string()
            }
        }
    }

    /// Get the severity for this event.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::SlotAvailable { .. } => Severity::Critical,
            Self::ChannelDisabled { .. } => Severity::Warning,
            Self::Test { .. } => Severity::Info,
        }
    }

    /// When the event happened; used as the email `Date`.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SlotAvailable { timestamp, .. }
            | Self::ChannelDisabled { timestamp, .. }
            | Self::Test { timestamp } => *timestamp,
        }
    }
}
