//! Selected slots and last observed statuses.

use std::collections::{BTreeSet, HashMap};

use crate::slot::{SlotId, SlotStatus};

/// In-memory record of what the user tracks and what the page last showed.
#[derive(Debug, Default)]
pub struct SlotRegistry {
    selected: BTreeSet<SlotId>,
    previous: HashMap<SlotId, SlotStatus>,
}

impl SlotRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a slot. Returns `false` if it was already selected.
    pub fn select(&mut self, id: SlotId) -> bool {
        self.selected.insert(id)
    }

    /// Stop tracking a slot. Returns `false` if it was not selected.
    pub fn deselect(&mut self, id: &SlotId) -> bool {
        self.selected.remove(id)
    }

    #[must_use]
    pub fn is_selected(&self, id: &SlotId) -> bool {
        self.selected.contains(id)
    }

    /// Copy of the selected set, sorted by identity.
    #[must_use]
    pub fn selected(&self) -> Vec<SlotId> {
        self.selected.iter().cloned().collect()
    }

    /// Overwrite the last known status of a slot.
    pub fn record_status(&mut self, id: SlotId, status: SlotStatus) {
        self.previous.insert(id, status);
    }

    /// Last known status, or [`SlotStatus::Unknown`] if never observed.
    #[must_use]
    pub fn get_previous(&self, id: &SlotId) -> SlotStatus {
        self.previous
            .get(id)
            .cloned()
            .unwrap_or(SlotStatus::Unknown)
    }

    /// Force a slot back to "FULL" so its next availability fires again.
    pub fn rearm(&mut self, id: &SlotId) {
        self.previous.insert(id.clone(), SlotStatus::full());
    }
}
