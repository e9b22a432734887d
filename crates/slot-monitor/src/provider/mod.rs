//! Snapshot providers.
//!
//! A provider turns "now" into a [`Snapshot`] of the booking page or fails
//! with a [`FetchError`]; the monitor treats every failure as transient.

mod parser;

pub use parser::{SchedulePageParser, UNKNOWN_DATE};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{MonitorConfig, Venue};
use crate::error::FetchError;
use crate::slot::Snapshot;

/// `User-Agent` sent with page requests.
const USER_AGENT: &str = concat!("fcbooking-monitor/", env!("CARGO_PKG_VERSION"));

/// Source of point-in-time slot snapshots.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the current state of every slot.
    async fn fetch(&self) -> Result<Snapshot, FetchError>;
}

/// Fetches and parses the booking page over HTTP.
pub struct HttpSnapshotProvider {
    client: reqwest::Client,
    url: String,
    venues: Vec<Venue>,
}

impl HttpSnapshotProvider {
    /// Create a provider for the configured URL, venues and timeout.
    pub fn new(config: &MonitorConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            venues: config.venues.clone(),
        })
    }

    async fn fetch_page(&self) -> Result<String, FetchError> {
        info!(url = %self.url, "Fetching booking page");

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let html = response.text().await?;
        debug!(len = html.len(), "Got page content");
        Ok(html)
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn fetch(&self) -> Result<Snapshot, FetchError> {
        let html = self.fetch_page().await?;
        let records = SchedulePageParser::parse(&html, &self.venues)?;
        info!(count = records.len(), "Parsed schedule slots");
        Ok(Snapshot::new(records))
    }
}
