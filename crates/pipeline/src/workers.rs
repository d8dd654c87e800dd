//! Worker list with client-side filtering and sorting.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use horde_client::messages::WorkerDetails;
use horde_client::{ErrorReporter, HordeApi};
use horde_core::error::CoreError;
use horde_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::events::{EventBus, HordeEvent};

pub const WORKER_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFilter {
    pub online_only: bool,
    pub trusted_only: bool,
    /// Keep workers serving a model whose name contains this (case-insensitive).
    pub model: Option<String>,
}

impl WorkerFilter {
    pub fn matches(&self, worker: &WorkerDetails) -> bool {
        if self.online_only && !worker.online {
            return false;
        }
        if self.trusted_only && !worker.trusted {
            return false;
        }
        match self.model.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => {
                let needle = model.to_lowercase();
                worker
                    .models
                    .iter()
                    .any(|m| m.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerSort {
    #[default]
    Name,
    Uptime,
    RequestsFulfilled,
    MegapixelSteps,
}

impl FromStr for WorkerSort {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "uptime" => Ok(Self::Uptime),
            "requests" | "requests_fulfilled" => Ok(Self::RequestsFulfilled),
            "mps" | "megapixelsteps" => Ok(Self::MegapixelSteps),
            other => Err(CoreError::Validation(format!(
                "Invalid worker sort '{other}'. Must be one of: name, uptime, requests, megapixelsteps"
            ))),
        }
    }
}

/// Filter then sort. Name sorts ascending (case-insensitive); the
/// numeric criteria sort descending. Ties keep server order.
pub fn filter_and_sort(
    workers: &[WorkerDetails],
    filter: &WorkerFilter,
    sort: WorkerSort,
) -> Vec<WorkerDetails> {
    let mut selected: Vec<WorkerDetails> = workers
        .iter()
        .filter(|w| filter.matches(w))
        .cloned()
        .collect();

    match sort {
        WorkerSort::Name => {
            selected.sort_by_key(|w| w.name.to_lowercase());
        }
        WorkerSort::Uptime => selected.sort_by(|a, b| b.uptime.cmp(&a.uptime)),
        WorkerSort::RequestsFulfilled => {
            selected.sort_by(|a, b| b.requests_fulfilled.cmp(&a.requests_fulfilled));
        }
        WorkerSort::MegapixelSteps => selected.sort_by(|a, b| {
            b.megapixelsteps_generated
                .total_cmp(&a.megapixelsteps_generated)
        }),
    }
    selected
}

// ---------------------------------------------------------------------------
// WorkerMonitor
// ---------------------------------------------------------------------------

/// Keeps a cached copy of the worker list, refreshed periodically.
pub struct WorkerMonitor {
    api: HordeApi,
    reporter: Arc<dyn ErrorReporter>,
    events: Arc<EventBus>,
    workers: RwLock<Vec<WorkerDetails>>,
    refreshed_at: RwLock<Option<Timestamp>>,
    interval: Duration,
}

impl WorkerMonitor {
    pub fn new(api: HordeApi, reporter: Arc<dyn ErrorReporter>, events: Arc<EventBus>) -> Self {
        Self {
            api,
            reporter,
            events,
            workers: RwLock::new(Vec::new()),
            refreshed_at: RwLock::new(None),
            interval: WORKER_REFRESH_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replace the cached list with a fresh one. Returns the worker count.
    pub async fn refresh(&self) -> Result<usize, SessionError> {
        let workers = match self.api.workers().await {
            Ok(workers) => workers,
            Err(e) => {
                let e = SessionError::from(e);
                self.reporter.report(&e.to_string());
                return Err(e);
            }
        };

        let count = workers.len();
        *self.workers.write().await = workers;
        *self.refreshed_at.write().await = Some(chrono::Utc::now());
        tracing::debug!(count, "Worker list refreshed");
        self.events.publish(HordeEvent::WorkersUpdated { count });
        Ok(count)
    }

    /// The cached list, filtered and sorted.
    pub async fn view(&self, filter: &WorkerFilter, sort: WorkerSort) -> Vec<WorkerDetails> {
        filter_and_sort(&self.workers.read().await, filter, sort)
    }

    pub async fn refreshed_at(&self) -> Option<Timestamp> {
        *self.refreshed_at.read().await
    }

    /// Refresh every interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker monitor cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::debug!(error = %e, "Worker refresh failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(name: &str, online: bool, trusted: bool, uptime: u64, models: &[&str]) -> WorkerDetails {
        WorkerDetails {
            name: name.into(),
            online,
            trusted,
            uptime,
            models: models.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    fn names(workers: &[WorkerDetails]) -> Vec<&str> {
        workers.iter().map(|w| w.name.as_str()).collect()
    }

    #[test]
    fn filters_combine() {
        let workers = vec![
            worker("a", true, true, 1, &["stable_diffusion"]),
            worker("b", false, true, 2, &["stable_diffusion"]),
            worker("c", true, false, 3, &["Deliberate"]),
        ];
        let filter = WorkerFilter {
            online_only: true,
            trusted_only: false,
            model: Some("deliberate".into()),
        };
        assert_eq!(names(&filter_and_sort(&workers, &filter, WorkerSort::Name)), vec!["c"]);

        let trusted = WorkerFilter {
            trusted_only: true,
            ..Default::default()
        };
        assert_eq!(names(&filter_and_sort(&workers, &trusted, WorkerSort::Name)), vec!["a", "b"]);
    }

    #[test]
    fn uptime_sorts_descending_and_keeps_ties_in_order() {
        let workers = vec![
            worker("short", true, true, 10, &[]),
            worker("tie-1", true, true, 50, &[]),
            worker("tie-2", true, true, 50, &[]),
        ];
        let sorted = filter_and_sort(&workers, &WorkerFilter::default(), WorkerSort::Uptime);
        assert_eq!(names(&sorted), vec!["tie-1", "tie-2", "short"]);
    }

    #[test]
    fn name_sort_ignores_case() {
        let workers = vec![worker("beta", true, true, 0, &[]), worker("Alpha", true, true, 0, &[])];
        let sorted = filter_and_sort(&workers, &WorkerFilter::default(), WorkerSort::Name);
        assert_eq!(names(&sorted), vec!["Alpha", "beta"]);
    }

    #[test]
    fn parses_sort_names() {
        assert_eq!("mps".parse::<WorkerSort>().unwrap(), WorkerSort::MegapixelSteps);
        assert!("speed".parse::<WorkerSort>().is_err());
    }
}
