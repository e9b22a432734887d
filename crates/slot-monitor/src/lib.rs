//! Booking slot monitor for the HKU fitness centre booking site.
//!
//! This crate provides:
//! - Schedule page fetching and parsing into slot snapshots
//! - A selected-slot registry with previous-status tracking
//! - FULL to available transition detection
//! - An alert lifecycle with acknowledgement windows and re-arming
//! - A cancellable periodic monitor loop
//! - An interactive terminal session

pub mod alerts;
pub mod config;
pub mod console;
pub mod detector;
pub mod error;
pub mod monitor;
pub mod provider;
pub mod registry;
pub mod slot;
pub mod state;

// Re-export main types
pub use alerts::{
    AlertManager, AlertOutcome, AlertRequest, AlertSink, PromptAlertSink, WaitingPrompt,
};
pub use config::{MonitorConfig, Venue};
pub use console::{Command, Session};
pub use detector::Transition;
pub use error::{ConfigError, FetchError};
pub use monitor::{CycleOutcome, Monitor, MonitorStatus};
pub use provider::{HttpSnapshotProvider, SchedulePageParser, SnapshotProvider, UNKNOWN_DATE};
pub use registry::SlotRegistry;
pub use slot::{SlotId, SlotRecord, SlotStatus, Snapshot};
pub use state::MonitorState;
