mod http;

pub use http::HttpMonitorApi;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::group::MonitorLookup;
use crate::model::{Monitor, MonitorSummary};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error {status} from {path}: {body}")]
    Http {
        path: String,
        status: u16,
        body: String,
    },
    #[error("Network error calling {path}: {reason}")]
    Network { path: String, reason: String },
    #[error("Timeout calling {path}")]
    Timeout { path: String },
    #[error("Invalid response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error("Invalid client configuration: {0}")]
    Client(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The Kener monitor endpoints used by the agent.
///
/// Implementations only provide the raw query and the create call; the
/// lookup helpers are derived from them and never fail. A remote error in
/// a helper is logged and read as "not found".
#[async_trait]
pub trait MonitorApi: Send + Sync {
    /// `GET /api/monitor`, optionally filtered by tag. Returns the JSON array
    /// as sent by the server.
    async fn query_monitors(&self, tag: Option<&str>) -> Result<Vec<Value>, ApiError>;

    /// `POST /api/monitor`. Succeeds only on `201 Created`.
    async fn create_monitor(&self, monitor: &Monitor) -> Result<(), ApiError>;

    async fn monitor_exists(&self, tag: &str) -> bool {
        if tag.is_empty() {
            warn!("monitor_exists called with empty tag");
            return false;
        }
        match self.query_monitors(Some(tag)).await {
            Ok(found) => {
                debug!(tag, matches = found.len(), "Checked monitor existence");
                !found.is_empty()
            }
            Err(e) => {
                warn!(tag, error = %e, "Failed to check whether monitor exists");
                false
            }
        }
    }

    async fn get_monitor_by_tag(&self, tag: &str) -> Option<Monitor> {
        if tag.is_empty() {
            warn!("get_monitor_by_tag called with empty tag");
            return None;
        }
        let found = match self.query_monitors(Some(tag)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(tag, error = %e, "Failed to fetch monitor");
                return None;
            }
        };
        let Some(first) = found.first() else {
            warn!(tag, "No monitor found for tag");
            return None;
        };
        match Monitor::from_remote(first) {
            Ok(monitor) => {
                info!(tag, id = ?monitor.id, "Resolved tag to monitor");
                Some(monitor)
            }
            Err(e) => {
                warn!(tag, error = %e, "Monitor returned by the server could not be decoded");
                None
            }
        }
    }

    /// All monitors on the server. Entries that fail to decode are skipped.
    async fn list_monitors(&self) -> Result<Vec<Monitor>, ApiError> {
        let records = self.query_monitors(None).await?;
        let mut monitors = Vec::with_capacity(records.len());
        for record in &records {
            match Monitor::from_remote(record) {
                Ok(monitor) => monitors.push(monitor),
                Err(e) => warn!(error = %e, "Skipping undecodable monitor in listing"),
            }
        }
        Ok(monitors)
    }
}

#[async_trait]
impl<T> MonitorLookup for T
where
    T: MonitorApi + ?Sized,
{
    async fn lookup_by_tag(&self, tag: &str) -> Option<MonitorSummary> {
        if tag.is_empty() {
            return None;
        }
        let found = match self.query_monitors(Some(tag)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(tag, error = %e, "Failed to look up monitor");
                return None;
            }
        };
        let first = found.first()?;
        match MonitorSummary::from_remote(first) {
            Ok(summary) => {
                debug!(tag, id = summary.id, "Resolved tag to monitor id");
                Some(summary)
            }
            Err(e) => {
                warn!(tag, error = %e, "Monitor returned by the server has no usable id");
                None
            }
        }
    }
}
