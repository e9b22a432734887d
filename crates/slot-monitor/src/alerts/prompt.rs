//! Terminal alert surface.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use super::{AlertOutcome, AlertRequest, AlertSink};
use crate::slot::SlotId;

/// Prints alerts to the terminal and waits for `ack`/`dismiss` from the session.
#[derive(Default)]
pub struct PromptAlertSink {
    pending: Mutex<HashMap<SlotId, oneshot::Sender<AlertOutcome>>>,
}

impl PromptAlertSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the prompt currently shown for `id` off the pending list.
    ///
    /// Answer it later with [`WaitingPrompt::answer`]. A prompt shown for the
    /// same slot after this call is a separate entry and is left alone.
    pub async fn withdraw(&self, id: &SlotId) -> Option<WaitingPrompt> {
        self.pending
            .lock()
            .await
            .remove(id)
            .map(|tx| WaitingPrompt { tx })
    }

    /// Slots whose prompt is still waiting for an answer, sorted.
    pub async fn pending(&self) -> Vec<SlotId> {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, tx| !tx.is_closed());
        let mut ids: Vec<SlotId> = pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Dismiss every waiting prompt (used on shutdown).
    pub async fn dismiss_all(&self) {
        for (_, tx) in self.pending.lock().await.drain() {
            let _ = tx.send(AlertOutcome::ExpiredOrDismissed);
        }
    }
}

/// A prompt taken off the pending list, still waiting for its answer.
#[derive(Debug)]
pub struct WaitingPrompt {
    tx: oneshot::Sender<AlertOutcome>,
}

impl WaitingPrompt {
    /// Resolve the prompt. Returns `false` if it had already gone away.
    pub fn answer(self, outcome: AlertOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

#[async_trait]
impl AlertSink for PromptAlertSink {
    async fn present(&self, alert: &AlertRequest, window: Duration) -> AlertOutcome {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(alert.slot.clone(), tx);

        println!();
        println!("{}", "=== Slot Available! ===".green().bold());
        println!("A spot has opened up for:");
        println!("  {}  ({})", alert.label.bold(), alert.status);
        println!(
            "Type {} to stop monitoring it, or {} to keep watching. Auto-dismiss in {}s.",
            format!("ack {}", alert.slot).cyan(),
            format!("dismiss {}", alert.slot).cyan(),
            window.as_secs()
        );

        // A dropped sender means the prompt went away unanswered.
        let outcome = rx.await.unwrap_or(AlertOutcome::ExpiredOrDismissed);
        debug!(slot = %alert.slot, ?outcome, "Prompt answered");
        outcome
    }

    async fn notice(&self, message: &str) {
        println!();
        println!("{} {}", "Notice:".yellow().bold(), message);
    }
}
