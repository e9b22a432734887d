//! fcbooking-monitor CLI - watch fitness centre booking slots for openings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use notify::{EmailChannel, Notifier, NotifyChannel, NotifyEvent, RetryPolicy, SmtpConfig};
use slot_monitor::config::{
    DEFAULT_ALERT_WINDOW_SECS, DEFAULT_EMAIL_ATTEMPTS, DEFAULT_EMAIL_BACKOFF_SECS,
    DEFAULT_EMAIL_TIMEOUT_SECS, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_REFRESH_INTERVAL_SECS,
    DEFAULT_URL,
};
use slot_monitor::console::{render_snapshot, HELP};
use slot_monitor::{
    AlertManager, HttpSnapshotProvider, Monitor, MonitorConfig, MonitorState, PromptAlertSink,
    Session, SnapshotProvider, Venue,
};

/// Watch the HKU fitness centre booking site and alert when a full slot opens up.
#[derive(Parser)]
#[command(name = "fcbooking-monitor")]
#[command(about = "Fitness centre booking slot monitor")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    options: MonitorArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct MonitorArgs {
    /// Booking page URL
    #[arg(long, env = "FCBOOKING_URL", default_value = DEFAULT_URL, global = true)]
    url: String,

    /// Venue to extract as `Name=section-id` (repeatable, defaults to both gyms)
    #[arg(long = "venue", env = "FCBOOKING_VENUES", value_delimiter = ',', global = true)]
    venues: Vec<Venue>,

    /// Seconds between checks
    #[arg(long, env = "FCBOOKING_INTERVAL", default_value_t = DEFAULT_REFRESH_INTERVAL_SECS, global = true)]
    interval: u64,

    /// Seconds an alert waits for acknowledgement
    #[arg(long, env = "FCBOOKING_ALERT_WINDOW", default_value_t = DEFAULT_ALERT_WINDOW_SECS, global = true)]
    alert_window: u64,

    /// Seconds before a page fetch is abandoned
    #[arg(long, env = "FCBOOKING_FETCH_TIMEOUT", default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, global = true)]
    fetch_timeout: u64,

    /// Email send attempts before email is disabled
    #[arg(long, env = "FCBOOKING_EMAIL_ATTEMPTS", default_value_t = DEFAULT_EMAIL_ATTEMPTS, global = true)]
    email_attempts: u32,

    /// Seconds between email attempts
    #[arg(long, env = "FCBOOKING_EMAIL_BACKOFF", default_value_t = DEFAULT_EMAIL_BACKOFF_SECS, global = true)]
    email_backoff: u64,

    /// Seconds before a single email send is abandoned
    #[arg(long, env = "FCBOOKING_EMAIL_TIMEOUT", default_value_t = DEFAULT_EMAIL_TIMEOUT_SECS, global = true)]
    email_timeout: u64,

    /// YAML file with SMTP credentials (otherwise SMTP_* environment variables)
    #[arg(long, env = "FCBOOKING_SECRETS", global = true)]
    secrets: Option<PathBuf>,
}

impl MonitorArgs {
    fn to_config(&self) -> MonitorConfig {
        let venues = if self.venues.is_empty() {
            Venue::defaults()
        } else {
            self.venues.clone()
        };

        MonitorConfig {
            url: self.url.clone(),
            venues,
            refresh_interval: Duration::from_secs(self.interval),
            alert_window: Duration::from_secs(self.alert_window),
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
            email_retry: RetryPolicy {
                max_attempts: self.email_attempts,
                backoff: Duration::from_secs(self.email_backoff),
            },
            email_timeout: Duration::from_secs(self.email_timeout),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive session: list slots, select them and monitor (default)
    Watch,

    /// Fetch the booking page once and print it
    Snapshot {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Send a single test email with the configured SMTP settings
    TestEmail,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("fcbooking_monitor=debug,slot_monitor=debug,notify=debug,info")
    } else {
        EnvFilter::new("fcbooking_monitor=info,slot_monitor=info,notify=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = cli.options.to_config();
    config.validate().context("invalid monitor configuration")?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => {
            let smtp = load_smtp(cli.options.secrets.as_deref(), &config)?;
            run_watch(config, smtp).await?;
        }
        Commands::Snapshot { format } => {
            run_snapshot(&config, format).await?;
        }
        Commands::TestEmail => {
            let smtp = load_smtp(cli.options.secrets.as_deref(), &config)?
                .ok_or_else(|| anyhow!("SMTP is not configured: set SMTP_HOST or pass --secrets"))?;
            run_test_email(smtp).await?;
        }
    }

    Ok(())
}

/// SMTP settings from the secrets file if given, else from the environment.
fn load_smtp(secrets: Option<&Path>, config: &MonitorConfig) -> Result<Option<SmtpConfig>> {
    let smtp = match secrets {
        Some(path) => Some(
            SmtpConfig::from_secrets_file(path)
                .with_context(|| format!("failed to load secrets from {}", path.display()))?,
        ),
        None => SmtpConfig::from_env().context("invalid SMTP environment")?,
    };
    Ok(smtp.map(|smtp| smtp.with_send_timeout(config.email_timeout)))
}

async fn run_watch(config: MonitorConfig, smtp: Option<SmtpConfig>) -> Result<()> {
    let provider =
        Arc::new(HttpSnapshotProvider::new(&config).context("failed to build HTTP client")?);
    let state = MonitorState::new();
    let prompts = Arc::new(PromptAlertSink::new());

    let mut alerts = AlertManager::new(Arc::clone(&state), prompts.clone(), config.alert_window);
    let mut notices = None;
    if let Some(smtp) = smtp {
        let email: Arc<dyn NotifyChannel> =
            Arc::new(EmailChannel::new(smtp).context("failed to set up SMTP transport")?);
        let (notifier, rx) = Notifier::with_failure_notices(vec![email], config.email_retry);
        alerts = alerts.with_notifier(Arc::new(notifier));
        notices = Some(rx);
    } else {
        info!("SMTP not configured, email notifications off");
    }
    let alerts = Arc::new(alerts);
    let relay = notices.map(|rx| alerts.relay_notices(rx));

    let monitor = Monitor::new(provider, state, alerts, config.refresh_interval);
    let session = Session::new(Arc::clone(&monitor), Arc::clone(&prompts));

    println!("{}", "HKU Fitness Centre Slot Monitor".bold());
    println!("{HELP}\n");

    let mut status_rx = monitor.subscribe();
    let status_task = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            if status.is_error() {
                println!("{}", status.to_string().red());
            } else {
                println!("{}", status.to_string().dimmed());
            }
        }
    });

    let _initial = monitor.initial_load();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for SIGINT, shutting down");
                } else {
                    info!("Received SIGINT, shutting down");
                }
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let reply = session.handle_line(&line).await;
                    if !reply.text.is_empty() {
                        println!("{}", reply.text);
                    }
                    if reply.quit {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Input closed, shutting down");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read input, shutting down");
                    break;
                }
            }
        }
    }

    monitor.stop().await;
    prompts.dismiss_all().await;
    status_task.abort();
    if let Some(relay) = relay {
        relay.abort();
    }

    Ok(())
}

async fn run_snapshot(config: &MonitorConfig, format: OutputFormat) -> Result<()> {
    let provider = HttpSnapshotProvider::new(config).context("failed to build HTTP client")?;
    let snapshot = provider
        .fetch()
        .await
        .with_context(|| format!("failed to fetch {}", config.url))?;

    match format {
        OutputFormat::Text => {
            print!("{}", render_snapshot(&snapshot, &std::collections::HashSet::new()));
            println!("\nTotal: {} slots", snapshot.len());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

async fn run_test_email(smtp: SmtpConfig) -> Result<()> {
    println!(
        "Sending test email via {}:{} to {}...",
        smtp.host, smtp.port, smtp.to
    );

    let email: Arc<dyn NotifyChannel> =
        Arc::new(EmailChannel::new(smtp).context("failed to set up SMTP transport")?);
    let notifier = Notifier::with_channels(vec![email], RetryPolicy::default());

    let results = notifier
        .notify_and_wait(NotifyEvent::Test {
            timestamp: chrono::Utc::now(),
        })
        .await;

    let mut failed = 0;
    for (channel, result) in &results {
        match result {
            Ok(()) => println!("{} {channel}: sent", "✓".green()),
            Err(e) => {
                failed += 1;
                eprintln!("{} {channel}: {e}", "✗".red());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} channel(s) failed to send");
    }
    Ok(())
}
