//! Interactive terminal session.
//!
//! Lines typed by the user are parsed into [`Command`]s and executed against
//! a running [`Monitor`]. Slots are addressed either by their 1-based row in
//! the last `list` output or by their full `venue|date|time` identity.

use std::collections::HashSet;
use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::Arc;

use colored::Colorize;
use tracing::info;

use crate::alerts::{AlertOutcome, PromptAlertSink};
use crate::monitor::Monitor;
use crate::slot::{SlotId, Snapshot, ID_SEPARATOR};

/// A slot reference typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 1-based row number.
    Index(usize),
    Id(SlotId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for Target {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Ok(Self::Index(index));
        }
        s.parse::<SlotId>()
            .map(Self::Id)
            .map_err(|_| CommandError::InvalidTarget(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Select(Vec<Target>),
    Deselect(Vec<Target>),
    Selected,
    Start,
    Stop,
    Alerts,
    Ack(Target),
    Dismiss(Target),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}, type 'help' for a list of commands")]
    Unknown(String),

    #[error("'{0}' needs a slot number or id")]
    MissingTarget(&'static str),

    #[error("{0:?} is neither a row number nor a venue|date|time id")]
    InvalidTarget(String),
}

/// Parse one or more targets. A full identity may contain spaces, so an
/// argument containing the id separator is taken as a single id.
fn parse_targets(command: &'static str, args: &str) -> Result<Vec<Target>, CommandError> {
    let args = args.trim();
    if args.is_empty() {
        return Err(CommandError::MissingTarget(command));
    }
    if args.contains(ID_SEPARATOR) {
        return Ok(vec![args.parse()?]);
    }
    args.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse::<Target>)
        .collect()
}

fn parse_target(command: &'static str, args: &str) -> Result<Target, CommandError> {
    let args = args.trim();
    if args.is_empty() {
        return Err(CommandError::MissingTarget(command));
    }
    args.parse()
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "list" | "ls" => Ok(Self::List),
            "select" => parse_targets("select", args).map(Self::Select),
            "deselect" => parse_targets("deselect", args).map(Self::Deselect),
            "selected" => Ok(Self::Selected),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "alerts" => Ok(Self::Alerts),
            "ack" => parse_target("ack", args).map(Self::Ack),
            "dismiss" => parse_target("dismiss", args).map(Self::Dismiss),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

pub const HELP: &str = "\
Commands:
  list                    show the schedule (rows are numbered)
  select <n|id> [...]     monitor slots by row number or venue|date|time id
  deselect <n|id> [...]   stop monitoring slots
  selected                show monitored slots
  start                   start monitoring
  stop                    stop monitoring
  alerts                  show open alerts (numbered)
  ack <n|id>              acknowledge an alert and stop monitoring that slot
  dismiss <n|id>          dismiss an alert and keep monitoring that slot
  status                  show the monitor status
  help                    show this help
  quit                    exit";

/// Render a snapshot as a numbered table grouped by venue and date.
///
/// Selected rows are highlighted.
#[must_use]
pub fn render_snapshot(snapshot: &Snapshot, selected: &HashSet<SlotId>) -> String {
    let mut out = String::new();
    let mut venue: Option<&str> = None;
    let mut date: Option<&str> = None;

    for (i, record) in snapshot.records.iter().enumerate() {
        if venue != Some(record.venue.as_str()) {
            let _ = writeln!(out, "\n{}", format!("== {} ==", record.venue).bold());
            venue = Some(record.venue.as_str());
            date = None;
        }
        if date != Some(record.date.as_str()) {
            let _ = writeln!(out, "{}", format!("--- {} ---", record.date).dimmed());
            date = Some(record.date.as_str());
        }

        let status = if record.is_full() {
            record.status.red()
        } else {
            record.status.green()
        };
        let row = format!("{:>4}  {:<20} {}", i + 1, record.time, status);
        if selected.contains(&record.id) {
            let _ = writeln!(out, "{} {}", row.on_yellow().black(), "*".yellow());
        } else {
            let _ = writeln!(out, "{row}");
        }
    }

    if out.is_empty() {
        out.push_str("No slots on the page.\n");
    }
    out
}

/// Resolve a target against a numbered list.
fn resolve(target: &Target, rows: &[SlotId]) -> Option<SlotId> {
    match target {
        Target::Index(i) => i.checked_sub(1).and_then(|i| rows.get(i)).cloned(),
        Target::Id(id) => Some(id.clone()),
    }
}

/// What the session should print, and whether to exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub quit: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

/// Executes commands against a monitor and its prompt sink.
pub struct Session {
    monitor: Arc<Monitor>,
    prompts: Arc<PromptAlertSink>,
}

impl Session {
    #[must_use]
    pub fn new(monitor: Arc<Monitor>, prompts: Arc<PromptAlertSink>) -> Self {
        Self { monitor, prompts }
    }

    /// Parse and execute one input line.
    pub async fn handle_line(&self, line: &str) -> Reply {
        match line.parse::<Command>() {
            Ok(command) => self.execute(command).await,
            Err(CommandError::Empty) => Reply::default(),
            Err(e) => Reply::text(e.to_string().red().to_string()),
        }
    }

    pub async fn execute(&self, command: Command) -> Reply {
        let state = self.monitor.state();

        match command {
            Command::List => match state.latest_snapshot().await {
                Some(snapshot) => {
                    let selected: HashSet<SlotId> = state.selected().await.into_iter().collect();
                    Reply::text(render_snapshot(&snapshot, &selected))
                }
                None => Reply::text("No data loaded yet."),
            },
            Command::Select(targets) => self.change_selection(&targets, true).await,
            Command::Deselect(targets) => self.change_selection(&targets, false).await,
            Command::Selected => {
                let selected = state.selected().await;
                if selected.is_empty() {
                    return Reply::text("No slots selected.");
                }
                let mut text = String::new();
                for id in selected {
                    let previous = state.previous(&id).await;
                    let _ = writeln!(text, "  {}  [{previous}]", id.label());
                }
                Reply::text(text.trim_end().to_string())
            }
            Command::Start => {
                if self.monitor.start().await {
                    let mut text = String::from("Monitoring started...");
                    if state.selected().await.is_empty() {
                        text.push_str(&format!("\n{}", "No slots selected yet.".yellow()));
                    }
                    Reply::text(text)
                } else {
                    Reply::text("Monitoring is already active.")
                }
            }
            Command::Stop => {
                if self.monitor.stop().await {
                    Reply::text("Monitoring stopped.")
                } else {
                    Reply::text("Monitoring is not running.")
                }
            }
            Command::Alerts => {
                let active = self.monitor.alerts().active().await;
                if active.is_empty() {
                    return Reply::text("No open alerts.");
                }
                let mut text = String::new();
                for (i, id) in active.iter().enumerate() {
                    let _ = writeln!(text, "{:>4}  {}", i + 1, id.label());
                }
                Reply::text(text.trim_end().to_string())
            }
            Command::Ack(target) => self.close_alert(&target, AlertOutcome::Acknowledged).await,
            Command::Dismiss(target) => {
                self.close_alert(&target, AlertOutcome::ExpiredOrDismissed).await
            }
            Command::Status => {
                let status = self.monitor.subscribe().borrow().clone();
                let running = if self.monitor.is_running().await {
                    "running".green()
                } else {
                    "stopped".yellow()
                };
                let line = if status.is_error() {
                    status.to_string().red()
                } else {
                    status.to_string().normal()
                };
                let email = match self.monitor.alerts().email_channels() {
                    None => "off".normal(),
                    Some(0) => "disabled".red(),
                    Some(_) => "on".green(),
                };
                Reply::text(format!(
                    "{line}\nMonitor: {running}, {} selected, {} open alerts, email {email}",
                    state.selected().await.len(),
                    state.active_alerts().await.len()
                ))
            }
            Command::Help => Reply::text(HELP),
            Command::Quit => Reply {
                text: String::new(),
                quit: true,
            },
        }
    }

    async fn change_selection(&self, targets: &[Target], select: bool) -> Reply {
        let state = self.monitor.state();
        let rows: Vec<SlotId> = state
            .latest_snapshot()
            .await
            .map(|s| s.records.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default();

        let mut text = String::new();
        for target in targets {
            let Some(id) = resolve(target, &rows) else {
                let _ = writeln!(text, "{}", format!("No slot at row {target}").red());
                continue;
            };
            let changed = if select {
                state.select(id.clone()).await
            } else {
                state.deselect(&id).await
            };
            let verb = match (select, changed) {
                (true, true) => "Selected",
                (true, false) => "Already selected",
                (false, true) => "Deselected",
                (false, false) => "Not selected",
            };
            let _ = writeln!(text, "{verb}: {}", id.label());
        }

        let selected = state.selected().await;
        info!(count = selected.len(), "Selection changed");
        Reply::text(text.trim_end().to_string())
    }

    async fn close_alert(&self, target: &Target, outcome: AlertOutcome) -> Reply {
        let alerts = self.monitor.alerts();
        let active = alerts.active().await;
        let Some(id) = resolve(target, &active) else {
            return Reply::text(format!("No open alert at {target}").red().to_string());
        };

        // Take this alert's prompt before closing it: a dismissed slot can fire
        // again straight away and show a new prompt under the same id.
        let prompt = self.prompts.withdraw(&id).await;
        let closed = match outcome {
            AlertOutcome::Acknowledged => alerts.acknowledge(&id).await,
            AlertOutcome::ExpiredOrDismissed => alerts.expire_or_dismiss(&id).await,
        };
        // The prompt task's late outcome is ignored by the manager.
        if let Some(prompt) = prompt {
            prompt.answer(outcome);
        }

        if !closed {
            return Reply::text(format!("No open alert for {}", id.label()));
        }
        match outcome {
            AlertOutcome::Acknowledged => {
                Reply::text(format!("Acknowledged, no longer monitoring {}", id.label()))
            }
            AlertOutcome::ExpiredOrDismissed => {
                Reply::text(format!("Dismissed, still monitoring {}", id.label()))
            }
        }
    }
}
