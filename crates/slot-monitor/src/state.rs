//! Shared monitor state.
//!
//! Owned by one `Arc` and shared between the monitor loop, alert tasks and
//! the interactive session. Each structure has its own lock; when both are
//! needed, `active_alerts` is locked before `registry`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::detector::{self, Transition};
use crate::registry::SlotRegistry;
use crate::slot::{SlotId, SlotStatus, Snapshot};

/// Process-lifetime tracking state.
#[derive(Debug, Default)]
pub struct MonitorState {
    pub(crate) registry: Mutex<SlotRegistry>,
    /// Open alerts keyed by slot, valued by the alert's generation.
    pub(crate) active_alerts: Mutex<HashMap<SlotId, u64>>,
    latest: RwLock<Option<Arc<Snapshot>>>,
}

impl MonitorState {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start tracking a slot. Returns `false` if it was already selected.
    pub async fn select(&self, id: SlotId) -> bool {
        self.registry.lock().await.select(id)
    }

    /// Stop tracking a slot. Returns `false` if it was not selected.
    pub async fn deselect(&self, id: &SlotId) -> bool {
        self.registry.lock().await.deselect(id)
    }

    pub async fn is_selected(&self, id: &SlotId) -> bool {
        self.registry.lock().await.is_selected(id)
    }

    /// Copy of the selected slots, sorted.
    pub async fn selected(&self) -> Vec<SlotId> {
        self.registry.lock().await.selected()
    }

    /// Last known status of a slot.
    pub async fn previous(&self, id: &SlotId) -> SlotStatus {
        self.registry.lock().await.get_previous(id)
    }

    pub async fn is_alert_active(&self, id: &SlotId) -> bool {
        self.active_alerts.lock().await.contains_key(id)
    }

    /// Slots with an open alert, sorted.
    pub async fn active_alerts(&self) -> Vec<SlotId> {
        let mut ids: Vec<SlotId> = self.active_alerts.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Most recent successful snapshot, if any.
    pub async fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().await.clone()
    }

    pub(crate) async fn set_latest(&self, snapshot: Arc<Snapshot>) {
        *self.latest.write().await = Some(snapshot);
    }

    /// Run change detection against the registry.
    pub(crate) async fn detect(&self, snapshot: &Snapshot) -> Vec<Transition> {
        let mut registry = self.registry.lock().await;
        detector::detect(&mut registry, snapshot)
    }

    /// Record the first snapshot's statuses.
    pub(crate) async fn seed(&self, snapshot: &Snapshot) {
        let mut registry = self.registry.lock().await;
        detector::seed(&mut registry, snapshot);
    }
}
