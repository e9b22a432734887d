//! Slot identities, records and snapshots.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used when serializing a [`SlotId`].
pub const ID_SEPARATOR: char = '|';

/// Separator used in the human readable label.
const LABEL_SEPARATOR: &str = " - ";

/// Status literal the booking page uses for a slot with no spaces left.
pub const FULL: &str = "FULL";

/// Stable identity of one bookable slot: `(venue, date label, time label)`.
///
/// Serialized as `venue|date|time`. Ordering is lexicographic on the serialized
/// form, which keeps listings of selected slots deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotId(String);

impl SlotId {
    /// Build an identity from its three components.
    #[must_use]
    pub fn new(venue: &str, date: &str, time: &str) -> Self {
        Self(format!("{venue}{ID_SEPARATOR}{date}{ID_SEPARATOR}{time}"))
    }

    /// The serialized `venue|date|time` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into `(venue, date, time)`.
    #[must_use]
    pub fn parts(&self) -> (&str, &str, &str) {
        let mut it = self.0.splitn(3, ID_SEPARATOR);
        let venue = it.next().unwrap_or_default();
        let date = it.next().unwrap_or_default();
        let time = it.next().unwrap_or_default();
        (venue, date, time)
    }

    /// Human readable label, e.g. `CSE Active - Mon 1 Jan - 07:00 - 08:00`.
    #[must_use]
    pub fn label(&self) -> String {
        let (venue, date, time) = self.parts();
        [venue, date, time].join(LABEL_SEPARATOR)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string is not a `venue|date|time` identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid slot id {0:?}: expected venue|date|time")]
pub struct ParseSlotIdError(String);

impl FromStr for SlotId {
    type Err = ParseSlotIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.split(ID_SEPARATOR).count() == 3 {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseSlotIdError(s.to_string()))
        }
    }
}

impl TryFrom<String> for SlotId {
    type Error = ParseSlotIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotId> for String {
    fn from(id: SlotId) -> Self {
        id.0
    }
}

/// True if a raw page status means "no spaces left".
#[must_use]
pub fn is_full(status: &str) -> bool {
    status.eq_ignore_ascii_case(FULL)
}

/// What the monitor last knew about a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    /// Never observed.
    Unknown,
    /// Tracked, but absent from the most recent snapshot.
    Missing,
    /// Raw status text from the page.
    Observed(String),
}

impl SlotStatus {
    /// Status forced onto a slot to re-arm detection.
    #[must_use]
    pub fn full() -> Self {
        Self::Observed(FULL.to_string())
    }

    /// True only for an observed "FULL" (any case).
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Observed(s) if is_full(s))
    }

    /// True for an observed status other than "FULL".
    ///
    /// `Unknown` and `Missing` are never available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Observed(s) if !is_full(s))
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Missing => f.write_str("not found"),
            Self::Observed(s) => f.write_str(s),
        }
    }
}

/// One row of the booking page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub id: SlotId,
    pub venue: String,
    pub date: String,
    pub time: String,
    pub status: String,
}

impl SlotRecord {
    /// Build a record, deriving its identity from venue, date and time.
    #[must_use]
    pub fn new(venue: &str, date: &str, time: &str, status: &str) -> Self {
        Self {
            id: SlotId::new(venue, date, time),
            venue: venue.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            status: status.to_string(),
        }
    }

    /// True if this slot has no spaces left.
    #[must_use]
    pub fn is_full(&self) -> bool {
        is_full(&self.status)
    }
}

/// All slot records of one page fetch, in page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<SlotRecord>,
}

impl Snapshot {
    /// Wrap records fetched just now.
    #[must_use]
    pub fn new(records: Vec<SlotRecord>) -> Self {
        Self {
            fetched_at: Utc::now(),
            records,
        }
    }

    /// Number of slots in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the snapshot holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identity to status lookup. Later duplicates win.
    #[must_use]
    pub fn statuses(&self) -> HashMap<&SlotId, &str> {
        self.records
            .iter()
            .map(|r| (&r.id, r.status.as_str()))
            .collect()
    }

    /// Look up a record by identity.
    #[must_use]
    pub fn get(&self, id: &SlotId) -> Option<&SlotRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Record at a 1-based display index.
    #[must_use]
    pub fn nth(&self, index: usize) -> Option<&SlotRecord> {
        index.checked_sub(1).and_then(|i| self.records.get(i))
    }
}
