//! End-to-end monitor scenarios against a scripted booking page.
//!
//! The provider returns whatever page the test last set, and the alert sink
//! never answers, so every alert ends through the manager's window or an
//! explicit acknowledge/dismiss.

use async_trait::async_trait;
use notify::{ChannelError, Notifier, NotifyChannel, NotifyEvent, RetryPolicy};
use slot_monitor::{
    AlertManager, AlertOutcome, AlertRequest, AlertSink, CycleOutcome, FetchError, Monitor,
    MonitorState, MonitorStatus, PromptAlertSink, Session, SlotId, SlotRecord, SlotStatus,
    Snapshot, SnapshotProvider,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VENUE: &str = "CSE Active";
const DATE: &str = "Mon 6 Jan";
const WINDOW: Duration = Duration::from_secs(300);
const INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// Test doubles
// =============================================================================

/// Serves the page most recently set by the test.
#[derive(Default)]
struct ScriptedProvider {
    page: Mutex<Vec<SlotRecord>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
}

impl ScriptedProvider {
    fn set(&self, rows: &[(&str, &str)]) {
        *self.page.lock().unwrap() = rows
            .iter()
            .map(|(time, status)| SlotRecord::new(VENUE, DATE, time, status))
            .collect();
    }

    fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotProvider for ScriptedProvider {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 503,
                url: "http://booking.test/".to_string(),
            });
        }
        Ok(Snapshot::new(self.page.lock().unwrap().clone()))
    }
}

/// Takes a while to answer, with a fixed page.
#[derive(Default)]
struct SlowProvider {
    fetches: AtomicUsize,
}

impl SlowProvider {
    const DELAY: Duration = Duration::from_secs(5);
}

#[async_trait]
impl SnapshotProvider for SlowProvider {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Self::DELAY).await;
        Ok(Snapshot::new(vec![SlotRecord::new(
            VENUE,
            DATE,
            "07:00 - 08:00",
            "FULL",
        )]))
    }
}

/// Records alerts and never answers them.
#[derive(Default)]
struct SilentSink {
    shown: tokio::sync::Mutex<Vec<AlertRequest>>,
}

#[async_trait]
impl AlertSink for SilentSink {
    async fn present(&self, alert: &AlertRequest, _window: Duration) -> AlertOutcome {
        self.shown.lock().await.push(alert.clone());
        std::future::pending().await
    }

    async fn notice(&self, _message: &str) {}
}

/// Email stand-in that records what it was asked to send.
#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<NotifyEvent>>,
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Email stand-in whose server is always down.
struct DownChannel;

#[async_trait]
impl NotifyChannel for DownChannel {
    fn name(&self) -> &'static str {
        "down"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, _event: &NotifyEvent) -> Result<(), ChannelError> {
        Err(ChannelError::Other("connection refused".to_string()))
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    sink: Arc<SilentSink>,
    state: Arc<MonitorState>,
    monitor: Arc<Monitor>,
}

fn harness() -> Harness {
    harness_with(None)
}

fn harness_with(notifier: Option<Arc<Notifier>>) -> Harness {
    let provider = Arc::new(ScriptedProvider::default());
    let sink = Arc::new(SilentSink::default());
    let state = MonitorState::new();

    let mut alerts = AlertManager::new(state.clone(), sink.clone(), WINDOW);
    if let Some(notifier) = notifier {
        alerts = alerts.with_notifier(notifier);
    }

    let monitor = Monitor::new(provider.clone(), state.clone(), Arc::new(alerts), INTERVAL);
    Harness {
        provider,
        sink,
        state,
        monitor,
    }
}

fn slot(time: &str) -> SlotId {
    SlotId::new(VENUE, DATE, time)
}

fn fired(outcome: &CycleOutcome) -> Vec<SlotId> {
    match outcome {
        CycleOutcome::Completed { fired, .. } => fired.iter().map(|t| t.slot.clone()).collect(),
        CycleOutcome::Skipped { error } => panic!("cycle skipped: {error}"),
    }
}

// =============================================================================
// Alert lifecycle scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_acknowledge_scenario() {
    let h = harness();
    let a = slot("07:00 - 08:00");

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.state.select(a.clone()).await;
    assert!(fired(&h.monitor.run_cycle().await).is_empty());
    assert!(h.state.previous(&a).await.is_full());
    assert!(!h.state.is_alert_active(&a).await);

    h.provider.set(&[("07:00 - 08:00", "12")]);
    assert_eq!(fired(&h.monitor.run_cycle().await), vec![a.clone()]);
    assert_eq!(h.state.previous(&a).await, SlotStatus::Observed("12".to_string()));
    assert!(h.state.is_alert_active(&a).await);

    assert!(h.monitor.alerts().acknowledge(&a).await);
    assert!(!h.state.is_selected(&a).await);
    assert!(!h.state.is_alert_active(&a).await);

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    assert!(fired(&h.monitor.run_cycle().await).is_empty());
    h.provider.set(&[("07:00 - 08:00", "3")]);
    assert!(fired(&h.monitor.run_cycle().await).is_empty());

    // The abandoned prompt's window passing changes nothing.
    tokio::time::sleep(WINDOW * 2).await;
    assert!(!h.state.is_selected(&a).await);
    assert_eq!(h.sink.shown.lock().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_alert_rearms_and_fires_again() {
    let h = harness();
    let a = slot("07:00 - 08:00");

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.state.select(a.clone()).await;
    h.monitor.run_cycle().await;

    h.provider.set(&[("07:00 - 08:00", "12")]);
    assert_eq!(fired(&h.monitor.run_cycle().await), vec![a.clone()]);

    tokio::time::sleep(WINDOW + Duration::from_secs(1)).await;
    assert!(h.state.previous(&a).await.is_full());
    assert!(!h.state.is_alert_active(&a).await);
    assert!(h.state.is_selected(&a).await);

    h.provider.set(&[("07:00 - 08:00", "5")]);
    assert_eq!(fired(&h.monitor.run_cycle().await), vec![a.clone()]);
    assert!(h.state.is_alert_active(&a).await);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.sink.shown.lock().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_open_alert_suppresses_refire() {
    let h = harness();
    let a = slot("07:00 - 08:00");

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.state.select(a.clone()).await;
    h.monitor.run_cycle().await;

    h.provider.set(&[("07:00 - 08:00", "12")]);
    h.monitor.run_cycle().await;

    // Full again then available again while the first alert is still open.
    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.monitor.run_cycle().await;
    h.provider.set(&[("07:00 - 08:00", "1")]);
    match h.monitor.run_cycle().await {
        CycleOutcome::Completed { fired, opened, .. } => {
            assert_eq!(fired.len(), 1);
            assert!(opened.is_empty());
        }
        CycleOutcome::Skipped { error } => panic!("cycle skipped: {error}"),
    }
    assert_eq!(h.state.active_alerts().await, vec![a]);
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_keeps_slot_selected() {
    let h = harness();
    let a = slot("07:00 - 08:00");

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.state.select(a.clone()).await;
    h.monitor.run_cycle().await;
    h.provider.set(&[("07:00 - 08:00", "12")]);
    h.monitor.run_cycle().await;

    assert!(h.monitor.alerts().expire_or_dismiss(&a).await);
    assert!(h.state.is_selected(&a).await);
    assert!(h.state.previous(&a).await.is_full());

    // Still "12" on the page: counts as a new opening.
    assert_eq!(fired(&h.monitor.run_cycle().await), vec![a]);
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_seeds_history() {
    let h = harness();
    let a = slot("07:00 - 08:00");
    let b = slot("08:00 - 09:00");

    h.provider.set(&[("07:00 - 08:00", "FULL"), ("08:00 - 09:00", "4")]);
    h.monitor.initial_load().await.unwrap();
    assert!(matches!(
        *h.monitor.subscribe().borrow(),
        MonitorStatus::Loaded { slots: 2, .. }
    ));

    h.state.select(a.clone()).await;
    h.state.select(b.clone()).await;

    // Seeded FULL fires on the very first cycle; seeded "4" going to "3" does not.
    h.provider.set(&[("07:00 - 08:00", "2"), ("08:00 - 09:00", "3")]);
    assert_eq!(fired(&h.monitor.run_cycle().await), vec![a]);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_slot_does_not_fire() {
    let h = harness();
    let a = slot("07:00 - 08:00");

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.state.select(a.clone()).await;
    h.monitor.run_cycle().await;

    h.provider.set(&[("09:00 - 10:00", "FULL")]);
    assert!(fired(&h.monitor.run_cycle().await).is_empty());
    assert_eq!(h.state.previous(&a).await, SlotStatus::Missing);

    // Reappearing after being missing is not a FULL -> available edge.
    h.provider.set(&[("07:00 - 08:00", "6")]);
    assert!(fired(&h.monitor.run_cycle().await).is_empty());
}

// =============================================================================
// Fetch failures and loop control
// =============================================================================

#[tokio::test]
async fn test_fetch_failure_leaves_state_untouched() {
    let h = harness();
    let a = slot("07:00 - 08:00");

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.state.select(a.clone()).await;
    h.monitor.run_cycle().await;
    let before = h.state.latest_snapshot().await.unwrap();

    h.provider.fail(true);
    let outcome = h.monitor.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::Skipped { .. }));
    assert!(h.monitor.subscribe().borrow().is_error());
    assert!(h.state.previous(&a).await.is_full());
    assert!(Arc::ptr_eq(&before, &h.state.latest_snapshot().await.unwrap()));

    h.provider.fail(false);
    h.provider.set(&[("07:00 - 08:00", "12")]);
    assert_eq!(fired(&h.monitor.run_cycle().await), vec![a]);
    assert!(matches!(
        *h.monitor.subscribe().borrow(),
        MonitorStatus::Monitoring { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_wait() {
    let h = harness();
    h.provider.set(&[("07:00 - 08:00", "FULL")]);

    assert!(h.monitor.start().await);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.provider.fetches(), 1);
    assert!(h.monitor.is_running().await);

    assert!(h.monitor.stop().await);
    assert_eq!(*h.monitor.subscribe().borrow(), MonitorStatus::Stopped);

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(h.provider.fetches(), 1);
    assert!(!h.monitor.is_running().await);
}

#[tokio::test(start_paused = true)]
async fn test_loop_runs_every_interval() {
    let h = harness();
    h.provider.set(&[("07:00 - 08:00", "FULL")]);

    h.monitor.start().await;
    tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
    assert_eq!(h.provider.fetches(), 3);
    h.monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_and_stop_are_idempotent() {
    let h = harness();
    h.provider.set(&[("07:00 - 08:00", "FULL")]);

    assert!(!h.monitor.stop().await);
    assert!(h.monitor.start().await);
    assert!(!h.monitor.start().await);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.provider.fetches(), 1);

    assert!(h.monitor.stop().await);
    assert!(!h.monitor.stop().await);

    // Restart runs a fresh cycle straight away.
    assert!(h.monitor.start().await);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.provider.fetches(), 2);
    h.monitor.stop().await;
}

// =============================================================================
// Email and session wiring
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_alert_sends_email() {
    let channel = Arc::new(RecordingChannel::default());
    let email: Arc<dyn NotifyChannel> = channel.clone();
    let notifier = Arc::new(Notifier::with_channels(vec![email], RetryPolicy::default()));
    let h = harness_with(Some(notifier));
    let a = slot("07:00 - 08:00");

    h.provider.set(&[("07:00 - 08:00", "FULL")]);
    h.state.select(a.clone()).await;
    h.monitor.run_cycle().await;
    h.provider.set(&[("07:00 - 08:00", "12")]);
    h.monitor.run_cycle().await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title(), format!("Slot Available: {}", a.label()));
}

#[tokio::test]
async fn test_session_commands() {
    let provider = Arc::new(ScriptedProvider::default());
    let state = MonitorState::new();
    let prompts = Arc::new(PromptAlertSink::new());
    let alerts = Arc::new(AlertManager::new(state.clone(), prompts.clone(), WINDOW));
    let monitor = Monitor::new(provider.clone(), state.clone(), alerts, INTERVAL);
    let session = Session::new(monitor.clone(), prompts.clone());

    assert_eq!(session.handle_line("list").await.text, "No data loaded yet.");

    provider.set(&[("07:00 - 08:00", "FULL"), ("08:00 - 09:00", "4")]);
    monitor.initial_load().await.unwrap();

    let reply = session.handle_line("select 1").await;
    assert!(reply.text.starts_with("Selected: "), "{}", reply.text);
    assert!(session.handle_line("select 1").await.text.starts_with("Already selected"));
    assert!(session.handle_line("select 9").await.text.contains("No slot at row 9"));
    assert!(session.handle_line("selected").await.text.contains("07:00 - 08:00"));

    provider.set(&[("07:00 - 08:00", "2"), ("08:00 - 09:00", "4")]);
    monitor.run_cycle().await;
    assert!(session.handle_line("alerts").await.text.contains("07:00 - 08:00"));
    while prompts.pending().await.is_empty() {
        tokio::task::yield_now().await;
    }

    let reply = session.handle_line("ack 1").await;
    assert!(reply.text.starts_with("Acknowledged"), "{}", reply.text);
    assert!(state.selected().await.is_empty());
    assert!(prompts.pending().await.is_empty());
    assert_eq!(session.handle_line("alerts").await.text, "No open alerts.");

    assert!(!session.handle_line("").await.quit);
    assert!(session.handle_line("quit").await.quit);
}

#[tokio::test]
async fn test_refired_alert_survives_answer_to_dismissed_prompt() {
    let provider = Arc::new(ScriptedProvider::default());
    let state = MonitorState::new();
    let prompts = Arc::new(PromptAlertSink::new());
    let alerts = Arc::new(AlertManager::new(state.clone(), prompts.clone(), WINDOW));
    let monitor = Monitor::new(provider.clone(), state.clone(), alerts.clone(), INTERVAL);
    let a = slot("07:00 - 08:00");

    provider.set(&[("07:00 - 08:00", "FULL")]);
    state.select(a.clone()).await;
    monitor.run_cycle().await;
    provider.set(&[("07:00 - 08:00", "12")]);
    monitor.run_cycle().await;
    while prompts.pending().await.is_empty() {
        tokio::task::yield_now().await;
    }

    // Dismiss, and let the next cycle re-open the alert before the old
    // prompt gets its answer.
    let old_prompt = prompts.withdraw(&a).await.unwrap();
    assert!(alerts.expire_or_dismiss(&a).await);
    assert_eq!(fired(&monitor.run_cycle().await), vec![a.clone()]);
    while prompts.pending().await.is_empty() {
        tokio::task::yield_now().await;
    }
    old_prompt.answer(AlertOutcome::ExpiredOrDismissed);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(alerts.active().await, vec![a.clone()]);
    assert_eq!(prompts.pending().await, vec![a.clone()]);
    assert_eq!(state.previous(&a).await, SlotStatus::Observed("12".to_string()));
}

#[tokio::test]
async fn test_session_dismiss_then_refire_keeps_new_alert() {
    let provider = Arc::new(ScriptedProvider::default());
    let state = MonitorState::new();
    let prompts = Arc::new(PromptAlertSink::new());
    let alerts = Arc::new(AlertManager::new(state.clone(), prompts.clone(), WINDOW));
    let monitor = Monitor::new(provider.clone(), state.clone(), alerts, INTERVAL);
    let session = Session::new(monitor.clone(), prompts.clone());
    let a = slot("07:00 - 08:00");

    provider.set(&[("07:00 - 08:00", "FULL")]);
    monitor.initial_load().await.unwrap();
    session.handle_line("select 1").await;
    provider.set(&[("07:00 - 08:00", "12")]);
    monitor.run_cycle().await;
    while prompts.pending().await.is_empty() {
        tokio::task::yield_now().await;
    }

    let reply = session.handle_line("dismiss 1").await;
    assert!(reply.text.starts_with("Dismissed"), "{}", reply.text);
    assert!(prompts.pending().await.is_empty());

    assert_eq!(fired(&monitor.run_cycle().await), vec![a.clone()]);
    while prompts.pending().await.is_empty() {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(state.active_alerts().await, vec![a.clone()]);
    assert_eq!(prompts.pending().await, vec![a]);

    let reply = session.handle_line("ack 1").await;
    assert!(reply.text.starts_with("Acknowledged"), "{}", reply.text);
    assert!(state.selected().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_finishing_after_stop_keeps_stopped_status() {
    let provider = Arc::new(SlowProvider::default());
    let state = MonitorState::new();
    let alerts = Arc::new(AlertManager::new(
        state.clone(),
        Arc::new(SilentSink::default()),
        WINDOW,
    ));
    let monitor = Monitor::new(provider.clone(), state.clone(), alerts, INTERVAL);

    assert!(monitor.start().await);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);

    // The fetch is still in flight when the loop is stopped.
    assert!(monitor.stop().await);
    tokio::time::sleep(SlowProvider::DELAY * 2).await;

    assert_eq!(*monitor.subscribe().borrow(), MonitorStatus::Stopped);
    assert!(state.latest_snapshot().await.is_some());
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_reports_email_state() {
    let status_line = |session: Session| async move { session.handle_line("status").await.text };
    let session_for = |notifier: Option<Arc<Notifier>>| {
        let provider = Arc::new(ScriptedProvider::default());
        let state = MonitorState::new();
        let prompts = Arc::new(PromptAlertSink::new());
        let mut alerts = AlertManager::new(state.clone(), prompts.clone(), WINDOW);
        if let Some(notifier) = notifier {
            alerts = alerts.with_notifier(notifier);
        }
        let monitor = Monitor::new(provider.clone(), state, Arc::new(alerts), INTERVAL);
        (provider, monitor.clone(), Session::new(monitor, prompts))
    };

    let (_, _, session) = session_for(None);
    assert!(status_line(session).await.contains("email off"));

    let down: Arc<dyn NotifyChannel> = Arc::new(DownChannel);
    let retry = RetryPolicy {
        max_attempts: 1,
        backoff: Duration::from_secs(1),
    };
    let notifier = Arc::new(Notifier::with_channels(vec![down], retry));
    let (provider, monitor, session) = session_for(Some(notifier.clone()));
    let a = slot("07:00 - 08:00");

    provider.set(&[("07:00 - 08:00", "FULL")]);
    monitor.state().select(a.clone()).await;
    monitor.run_cycle().await;
    assert_eq!(notifier.channel_count(), 1);

    provider.set(&[("07:00 - 08:00", "12")]);
    assert_eq!(fired(&monitor.run_cycle().await), vec![a]);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(notifier.channel_count(), 0);
    assert!(status_line(session).await.contains("disabled"));
}
