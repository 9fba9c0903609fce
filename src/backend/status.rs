//! Periodic backend reachability checks

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::DialogueBackend;
use crate::Error;

/// Interval between probes when none is configured
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(10);

/// Reachability of the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    /// A probe is in flight
    #[default]
    Checking,
    /// The backend answered
    Online,
    /// The backend could not be reached
    Offline,
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking..."),
            Self::Online => write!(f, "Backend Online"),
            Self::Offline => write!(f, "Backend Offline"),
        }
    }
}

/// Latest probe result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Current reachability
    pub status: BackendStatus,
    /// When the last probe finished
    pub last_checked: Option<DateTime<Utc>>,
}

/// Probe the backend once
///
/// Any HTTP answer, including an error status, counts as reachable.
pub async fn probe(backend: &dyn DialogueBackend) -> BackendStatus {
    match backend.health().await {
        Ok(report) => {
            tracing::debug!(status = %report.status, "backend healthy");
            BackendStatus::Online
        }
        Err(Error::Server { status, .. }) => {
            tracing::debug!(status, "backend reachable but unhealthy");
            BackendStatus::Online
        }
        Err(e) => {
            tracing::debug!(error = %e, "backend probe failed");
            BackendStatus::Offline
        }
    }
}

/// Probe the backend every `interval`, publishing each result
///
/// The task ends once every receiver is dropped.
pub fn spawn_monitor(
    backend: Arc<dyn DialogueBackend>,
    interval: Duration,
) -> (watch::Receiver<StatusReport>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(StatusReport::default());

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut previous = None;

        loop {
            ticker.tick().await;

            tx.send_modify(|report| report.status = BackendStatus::Checking);
            let status = probe(backend.as_ref()).await;
            let report = StatusReport {
                status,
                last_checked: Some(Utc::now()),
            };

            if tx.send(report).is_err() {
                break;
            }
            if previous != Some(status) {
                tracing::info!(%status, endpoint = backend.endpoint(), "backend status changed");
                previous = Some(status);
            }
        }

        tracing::debug!("backend monitor stopped");
    });

    (rx, handle)
}
