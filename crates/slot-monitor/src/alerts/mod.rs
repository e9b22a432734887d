//! Alert lifecycle.
//!
//! Each slot is either Idle or Open. `open` moves Idle to Open and surfaces
//! the alert; a second `open` while Open is ignored. An Open alert ends with
//! exactly one [`AlertOutcome`]:
//!
//! - `Acknowledged`: the slot leaves the selected set and the alert set; its
//!   tracked status stays at the available value just observed.
//! - `ExpiredOrDismissed`: the window elapsed or the prompt was closed; the
//!   slot stays selected, leaves the alert set, and its tracked status is
//!   forced back to "FULL" so the next available observation fires again.

mod prompt;

pub use prompt::{PromptAlertSink, WaitingPrompt};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notify::{Notifier, NotifyEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::detector::Transition;
use crate::slot::SlotId;
use crate::state::MonitorState;

/// How an open alert ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// The user confirmed the alert.
    Acknowledged,
    /// The window elapsed, or the alert was closed without confirming.
    ExpiredOrDismissed,
}

/// What a sink is asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub slot: SlotId,
    /// Human readable slot label.
    pub label: String,
    /// Status text that triggered the alert.
    pub status: String,
}

impl AlertRequest {
    #[must_use]
    pub fn from_transition(transition: &Transition) -> Self {
        Self {
            slot: transition.slot.clone(),
            label: transition.slot.label(),
            status: transition.status.clone(),
        }
    }
}

/// Interactive surface that shows an alert and reports how it ended.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Show an alert and wait for the user. The manager abandons the wait
    /// after `window` and treats that as expired.
    async fn present(&self, alert: &AlertRequest, window: Duration) -> AlertOutcome;

    /// Show a one-way message (e.g. "email notifications disabled").
    async fn notice(&self, message: &str);
}

/// Tracks open alerts and applies their outcomes to the monitor state.
pub struct AlertManager {
    state: Arc<MonitorState>,
    sink: Arc<dyn AlertSink>,
    notifier: Option<Arc<Notifier>>,
    window: Duration,
    generation: AtomicU64,
}

impl AlertManager {
    #[must_use]
    pub fn new(state: Arc<MonitorState>, sink: Arc<dyn AlertSink>, window: Duration) -> Self {
        Self {
            state,
            sink,
            notifier: None,
            window,
            generation: AtomicU64::new(0),
        }
    }

    /// Also send every alert through `notifier` (fire-and-forget).
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Forward notifier failure notices to the alert sink.
    pub fn relay_notices(&self, mut notices: mpsc::UnboundedReceiver<NotifyEvent>) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            while let Some(event) = notices.recv().await {
                sink.notice(&format!("{}\n{}", event.title(), event.body())).await;
            }
            debug!("Notice relay finished");
        })
    }

    /// Open an alert for a transition.
    ///
    /// Returns `false`, doing nothing, if the slot already has an open alert.
    pub async fn open(self: &Arc<Self>, transition: &Transition) -> bool {
        let generation = {
            let mut active = self.state.active_alerts.lock().await;
            if active.contains_key(&transition.slot) {
                debug!(slot = %transition.slot, "Alert already open, suppressing duplicate");
                return false;
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst);
            active.insert(transition.slot.clone(), generation);
            generation
        };

        let request = AlertRequest::from_transition(transition);
        info!(slot = %request.slot, status = %request.status, "Opening alert");

        if let Some(notifier) = &self.notifier {
            notifier.notify(NotifyEvent::slot_available(
                request.slot.as_str(),
                request.label.clone(),
                request.status.clone(),
            ));
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(
                manager.window,
                manager.sink.present(&request, manager.window),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    info!(slot = %request.slot, "Alert window elapsed without acknowledgement");
                    AlertOutcome::ExpiredOrDismissed
                }
            };
            manager.resolve(&request.slot, Some(generation), outcome).await;
        });

        true
    }

    /// Acknowledge an open alert. Returns `false` if none was open.
    pub async fn acknowledge(&self, id: &SlotId) -> bool {
        self.resolve(id, None, AlertOutcome::Acknowledged).await
    }

    /// Expire or dismiss an open alert. Returns `false` if none was open.
    pub async fn expire_or_dismiss(&self, id: &SlotId) -> bool {
        self.resolve(id, None, AlertOutcome::ExpiredOrDismissed).await
    }

    /// Slots with an open alert.
    pub async fn active(&self) -> Vec<SlotId> {
        self.state.active_alerts().await
    }

    /// Email channels still in use, or `None` if email was never configured.
    #[must_use]
    pub fn email_channels(&self) -> Option<usize> {
        self.notifier.as_ref().map(|notifier| notifier.channel_count())
    }

    /// Apply an outcome. With `generation`, only closes that specific alert.
    async fn resolve(&self, id: &SlotId, generation: Option<u64>, outcome: AlertOutcome) -> bool {
        let mut active = self.state.active_alerts.lock().await;
        match (active.get(id), generation) {
            (None, _) => return false,
            (Some(current), Some(expected)) if *current != expected => {
                debug!(slot = %id, "Stale alert outcome ignored");
                return false;
            }
            _ => {}
        }
        active.remove(id);

        let mut registry = self.state.registry.lock().await;
        match outcome {
            AlertOutcome::Acknowledged => {
                registry.deselect(id);
                info!(slot = %id, "Alert acknowledged, slot removed from monitoring");
            }
            AlertOutcome::ExpiredOrDismissed => {
                registry.rearm(id);
                info!(slot = %id, "Alert not acknowledged, slot re-armed");
            }
        }

        true
    }
}
