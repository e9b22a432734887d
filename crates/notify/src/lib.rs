//! Notification system for slot availability alerts.
//!
//! This crate provides a fire-and-forget notification system for sending
//! alerts through out-of-band channels (currently SMTP email) when a monitored
//! booking slot opens up.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{EmailChannel, Notifier, NotifyEvent, RetryPolicy, SmtpConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SmtpConfig::from_env()?.expect("SMTP_HOST set");
//! let email: Arc<dyn notify::NotifyChannel> = Arc::new(EmailChannel::new(config)?);
//! let (notifier, _notices) = Notifier::with_failure_notices(vec![email], RetryPolicy::default());
//!
//! // Send a notification (fire-and-forget)
//! notifier.notify(NotifyEvent::slot_available(
//!     "CSE Active|Mon 1 Jan|07:00 - 08:00",
//!     "CSE Active - Mon 1 Jan - 07:00 - 08:00",
//!     "12",
//! ));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`NotifyChannel`] trait defines the interface for notification channels
//! - [`EmailChannel`] implements SMTP delivery
//! - [`Notifier`] dispatches events to all enabled channels, retrying each
//!   failed send with a fixed backoff and disabling a channel for the rest of
//!   the process once its retries are exhausted

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::email::{EmailChannel, SmtpConfig, TlsMode};
pub use channels::NotifyChannel;
pub use error::{ChannelError, ConfigError};
pub use events::{NotifyEvent, Severity};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Retry behaviour for a single notification on a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total send attempts before the channel is given up on.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(10),
        }
    }
}

/// A channel plus its session-wide kill switch.
struct ChannelSlot {
    channel: Arc<dyn NotifyChannel>,
    disabled: AtomicBool,
}

/// Central notification dispatcher.
///
/// The `Notifier` manages multiple notification channels and dispatches
/// events to all enabled channels in a fire-and-forget manner.
pub struct Notifier {
    channels: Vec<Arc<ChannelSlot>>,
    retry: RetryPolicy,
    notices: Option<mpsc::UnboundedSender<NotifyEvent>>,
}

impl Notifier {
    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>, retry: RetryPolicy) -> Self {
        let channels: Vec<Arc<ChannelSlot>> = channels
            .into_iter()
            .map(|channel| {
                Arc::new(ChannelSlot {
                    channel,
                    disabled: AtomicBool::new(false),
                })
            })
            .collect();

        if channels.is_empty() {
            warn!("No notification channels configured");
        } else {
            info!(
                channel_count = channels.len(),
                max_attempts = retry.max_attempts,
                backoff_secs = retry.backoff.as_secs(),
                "Notification system initialized"
            );
        }

        Self {
            channels,
            retry,
            notices: None,
        }
    }

    /// Create a notifier that reports channels it gives up on.
    ///
    /// Exactly one [`NotifyEvent::ChannelDisabled`] is sent on the returned
    /// receiver per channel, the first time its retries are exhausted.
    #[must_use]
    pub fn with_failure_notices(
        channels: Vec<Arc<dyn NotifyChannel>>,
        retry: RetryPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<NotifyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut notifier = Self::with_channels(channels, retry);
        notifier.notices = Some(tx);
        (notifier, rx)
    }

    /// Get the number of channels that have not been disabled.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|slot| !slot.disabled.load(Ordering::SeqCst))
            .count()
    }

    /// Send a notification to all enabled channels (fire-and-forget).
    ///
    /// This method spawns async tasks for each channel and returns immediately.
    /// Failed sends are retried per the [`RetryPolicy`]; errors are logged but
    /// not propagated to the caller.
    pub fn notify(&self, event: NotifyEvent) {
        if self.channels.is_empty() {
            debug!("No channels configured, skipping event");
            return;
        }

        let event = Arc::new(event);

        for slot in &self.channels {
            let slot = Arc::clone(slot);
            let event = Arc::clone(&event);
            let retry = self.retry;
            let notices = self.notices.clone();

            tokio::spawn(async move {
                deliver(&slot, &event, retry, notices.as_ref()).await;
            });
        }
    }

    /// Send a notification and wait for all channels to complete.
    ///
    /// Unlike `notify()`, this method makes a single attempt per channel and
    /// collects the results. Useful for testing or when delivery confirmation
    /// is needed.
    pub async fn notify_and_wait(
        &self,
        event: NotifyEvent,
    ) -> Vec<(String, Result<(), ChannelError>)> {
        if self.channels.is_empty() {
            return vec![];
        }

        let mut results = vec![];

        for slot in &self.channels {
            let channel_name = slot.channel.name().to_string();
            let result = slot.channel.send(&event).await;
            results.push((channel_name, result));
        }

        results
    }
}

/// Deliver one event on one channel, retrying and disabling as configured.
async fn deliver(
    slot: &ChannelSlot,
    event: &NotifyEvent,
    retry: RetryPolicy,
    notices: Option<&mpsc::UnboundedSender<NotifyEvent>>,
) {
    let channel_name = slot.channel.name();

    if !slot.channel.enabled() {
        debug!(channel = channel_name, "Channel disabled, skipping");
        return;
    }

    // A send is always attempted at least once.
    let max_attempts = retry.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if slot.disabled.load(Ordering::SeqCst) {
            debug!(channel = channel_name, "Channel disabled for this session, skipping");
            return;
        }

        match slot.channel.send(event).await {
            Ok(()) => {
                debug!(channel = channel_name, attempt, "Notification sent");
                return;
            }
            Err(e) => {
                warn!(
                    channel = channel_name,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Notification attempt failed"
                );
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(retry.backoff).await;
        }
    }

    // Only the task that flips the switch reports it.
    if slot.disabled.swap(true, Ordering::SeqCst) {
        return;
    }

    let error = last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string());
    error!(
        channel = channel_name,
        attempts = max_attempts,
        error = %error,
        "Giving up on channel, disabled for the rest of the session"
    );

    if let Some(tx) = notices {
        let notice = NotifyEvent::ChannelDisabled {
            channel: channel_name.to_string(),
            attempts: max_attempts,
            error,
            timestamp: chrono::Utc::now(),
        };
        if tx.send(notice).is_err() {
            debug!(channel = channel_name, "Failure notice receiver dropped");
        }
    }
}
