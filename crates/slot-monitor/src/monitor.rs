//! Periodic monitor loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::AlertManager;
use crate::detector::Transition;
use crate::provider::SnapshotProvider;
use crate::slot::SlotId;
use crate::state::MonitorState;

/// Status line published after every load and cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStatus {
    Idle,
    Loading,
    Loaded { slots: usize, at: DateTime<Local> },
    Monitoring { at: DateTime<Local> },
    FetchFailed { error: String, at: DateTime<Local> },
    Stopped,
}

impl MonitorStatus {
    /// True for statuses that should be shown as errors.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::FetchFailed { .. })
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Ready."),
            Self::Loading => f.write_str("Ready. Fetching initial data..."),
            Self::Loaded { slots, at } => write!(
                f,
                "Initial data loaded successfully ({slots} slots). Last updated: {}",
                at.format("%H:%M:%S")
            ),
            Self::Monitoring { at } => {
                write!(f, "Monitoring... Last checked: {}", at.format("%H:%M:%S"))
            }
            Self::FetchFailed { at, .. } => write!(
                f,
                "Error: Could not fetch data. Check connection. ({})",
                at.format("%H:%M:%S")
            ),
            Self::Stopped => f.write_str("Monitoring stopped."),
        }
    }
}

/// Result of one fetch-detect-notify cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetch failed; nothing was changed.
    Skipped { error: String },
    /// Detection ran.
    Completed {
        slots: usize,
        fired: Vec<Transition>,
        /// Slots whose alert was opened (fired minus already-open ones).
        opened: Vec<SlotId>,
    },
}

struct RunHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RunHandle {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

/// Drives the provider, detector and alert manager on a fixed interval.
pub struct Monitor {
    provider: Arc<dyn SnapshotProvider>,
    state: Arc<MonitorState>,
    alerts: Arc<AlertManager>,
    interval: Duration,
    status: watch::Sender<MonitorStatus>,
    run: Mutex<Option<RunHandle>>,
    /// Held for the duration of a cycle so cycles never overlap.
    cycle: Mutex<()>,
}

impl Monitor {
    #[must_use]
    pub fn new(
        provider: Arc<dyn SnapshotProvider>,
        state: Arc<MonitorState>,
        alerts: Arc<AlertManager>,
        interval: Duration,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(MonitorStatus::Idle);
        Arc::new(Self {
            provider,
            state,
            alerts,
            interval,
            status,
            run: Mutex::new(None),
            cycle: Mutex::new(()),
        })
    }

    /// Shared state this monitor updates.
    #[must_use]
    pub fn state(&self) -> &Arc<MonitorState> {
        &self.state
    }

    /// Alert manager this monitor opens alerts on.
    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    /// Watch the status line.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status.subscribe()
    }

    fn publish(&self, status: MonitorStatus) {
        self.status.send_replace(status);
    }

    /// Publish a cycle result unless the loop it belongs to has been stopped.
    fn publish_cycle(&self, token: Option<&CancellationToken>, status: MonitorStatus) {
        if token.is_some_and(CancellationToken::is_cancelled) {
            debug!(%status, "Loop stopped during cycle, keeping stopped status");
            return;
        }
        self.publish(status);
    }

    /// Fetch the first snapshot in the background and seed the registry.
    pub fn initial_load(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let _cycle = monitor.cycle.lock().await;
            monitor.publish(MonitorStatus::Loading);

            match monitor.provider.fetch().await {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    monitor.state.seed(&snapshot).await;
                    monitor.state.set_latest(Arc::clone(&snapshot)).await;
                    info!(slots = snapshot.len(), "Initial data loaded");
                    monitor.publish(MonitorStatus::Loaded {
                        slots: snapshot.len(),
                        at: Local::now(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Initial load failed");
                    monitor.publish(MonitorStatus::FetchFailed {
                        error: e.to_string(),
                        at: Local::now(),
                    });
                }
            }
        })
    }

    /// Run one fetch-detect-notify cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.cycle(None).await
    }

    async fn cycle(&self, token: Option<&CancellationToken>) -> CycleOutcome {
        let _cycle = self.cycle.lock().await;
        debug!("Checking for updates");

        let snapshot = match self.provider.fetch().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, "Failed to fetch booking page, skipping cycle");
                self.publish_cycle(
                    token,
                    MonitorStatus::FetchFailed {
                        error: e.to_string(),
                        at: Local::now(),
                    },
                );
                return CycleOutcome::Skipped {
                    error: e.to_string(),
                };
            }
        };

        let fired = self.state.detect(&snapshot).await;
        self.state.set_latest(Arc::clone(&snapshot)).await;
        self.publish_cycle(token, MonitorStatus::Monitoring { at: Local::now() });

        let mut opened = Vec::new();
        for transition in &fired {
            if self.alerts.open(transition).await {
                opened.push(transition.slot.clone());
            }
        }

        debug!(slots = snapshot.len(), fired = fired.len(), opened = opened.len(), "Cycle complete");

        CycleOutcome::Completed {
            slots: snapshot.len(),
            fired,
            opened,
        }
    }

    /// Start the background loop. Returns `false` if it was already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut run = self.run.lock().await;
        if run.as_ref().is_some_and(RunHandle::is_live) {
            warn!("Monitoring is already active");
            return false;
        }

        let token = CancellationToken::new();
        let monitor = Arc::clone(self);
        let task = tokio::spawn(monitor.run_loop(token.clone()));
        *run = Some(RunHandle { token, task });

        info!(interval_secs = self.interval.as_secs(), "Monitoring has started");
        true
    }

    /// Stop the background loop. Returns `false` if it was not running.
    ///
    /// An in-flight fetch is allowed to finish; the loop exits right after.
    pub async fn stop(&self) -> bool {
        let Some(handle) = self.run.lock().await.take() else {
            return false;
        };
        let was_live = handle.is_live();
        handle.token.cancel();

        if was_live {
            self.publish(MonitorStatus::Stopped);
            info!("Monitoring has been stopped");
        }
        was_live
    }

    /// True while the background loop is running.
    pub async fn is_running(&self) -> bool {
        self.run.lock().await.as_ref().is_some_and(RunHandle::is_live)
    }

    async fn run_loop(self: Arc<Self>, token: CancellationToken) {
        while !token.is_cancelled() {
            self.cycle(Some(&token)).await;

            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Monitor loop exited");
    }
}
