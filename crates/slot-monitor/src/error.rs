//! Error types for slot monitoring.

use thiserror::Error;

/// Errors from fetching or parsing the booking page.
///
/// All of these are transient from the monitor's point of view: the cycle is
/// skipped and the next one tries again.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or timeout
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    /// A CSS selector could not be built
    #[error("Invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    /// The page parsed but contained no slot rows
    #[error("No schedule slots found on the page")]
    EmptySchedule,
}

/// Errors in user-supplied configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Venue argument not in `Name=section-id` form
    #[error("Invalid venue {0:?}: expected NAME=SECTION_ID")]
    InvalidVenue(String),

    /// A duration that must be positive was zero
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// Email would never be attempted
    #[error("email attempts must be at least 1")]
    ZeroAttempts,
}
