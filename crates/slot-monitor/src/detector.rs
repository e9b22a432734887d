//! Full-to-available transition detection.
//!
//! A selected slot fires when its previous status was "FULL" and the new
//! snapshot shows it with any other status. Slots never seen before
//! (`Unknown`) and slots that vanished from the page (`Missing`) never fire.
//! Every cycle records the new status of every slot in the snapshot plus the
//! `Missing` status of selected slots that are gone, whether or not anything
//! fired.

use tracing::{debug, info};

use crate::registry::SlotRegistry;
use crate::slot::{SlotId, SlotStatus, Snapshot};

/// A selected slot that just became available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub slot: SlotId,
    /// Raw status text seen this cycle.
    pub status: String,
}

/// True if going from `prev` to `curr` should notify.
#[must_use]
pub fn fires(prev: &SlotStatus, curr: &SlotStatus) -> bool {
    prev.is_full() && curr.is_available()
}

/// Compare a snapshot against the registry and update it.
///
/// Returns the selected slots that moved from full to available, in
/// identity order.
pub fn detect(registry: &mut SlotRegistry, snapshot: &Snapshot) -> Vec<Transition> {
    let lookup = snapshot.statuses();
    let mut transitions = Vec::new();

    // Copy first: acknowledgements may shrink the set while we work.
    for id in registry.selected() {
        let prev = registry.get_previous(&id);
        let curr = lookup
            .get(&id)
            .map_or(SlotStatus::Missing, |s| SlotStatus::Observed((*s).to_string()));

        if fires(&prev, &curr) {
            info!(slot = %id, status = %curr, "Change detected, slot is now available");
            transitions.push(Transition {
                slot: id.clone(),
                status: curr.to_string(),
            });
        } else if prev != curr {
            debug!(slot = %id, from = %prev, to = %curr, "Selected slot changed");
        }

        registry.record_status(id, curr);
    }

    for record in &snapshot.records {
        if !registry.is_selected(&record.id) {
            registry.record_status(record.id.clone(), SlotStatus::Observed(record.status.clone()));
        }
    }

    transitions
}

/// Record every slot of the first snapshot without evaluating transitions.
pub fn seed(registry: &mut SlotRegistry, snapshot: &Snapshot) {
    for record in &snapshot.records {
        registry.record_status(record.id.clone(), SlotStatus::Observed(record.status.clone()));
    }
    debug!(slots = snapshot.len(), "Seeded slot statuses");
}
