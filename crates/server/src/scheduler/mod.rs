//! Due-check scheduler: a fixed-cadence tick that expands every due
//! monitor into one job per region and offers each to the bounded worker
//! queue.
//!
//! Admission is strictly non-blocking: when the queue is full the job is
//! dropped, a drop counter is incremented, and the next tick re-emits the
//! monitor because its interval is still elapsed.

pub mod worker;

use std::collections::HashSet;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::entity::monitor;
use crate::metrics::Collector;
use crate::store::Store;

/// One unit of probe work: a monitor snapshot plus the region to probe
/// from. The snapshot keeps in-flight jobs immune to concurrent edits.
#[derive(Debug, Clone)]
pub struct CheckJob {
    pub monitor: monitor::Model,
    pub region: String,
}

pub struct Scheduler {
    store: Store,
    metrics: Arc<Collector>,
    config: SchedulerConfig,
    /// Region tags from the config catalog; monitor regions outside it
    /// are skipped with a warning.
    known_regions: HashSet<String>,
}

impl Scheduler {
    pub fn new(
        store: Store,
        metrics: Arc<Collector>,
        config: SchedulerConfig,
        known_regions: HashSet<String>,
    ) -> Self {
        Self {
            store,
            metrics,
            config,
            known_regions,
        }
    }

    /// Tick loop. Holds no state beyond the ticker; every tick re-derives
    /// the due set from the store.
    pub async fn run(self, queue: mpsc::Sender<CheckJob>, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_seconds = self.config.tick_interval_seconds,
            "Starting scheduler"
        );
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.schedule_due(&queue).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Stopping scheduler");
                        return;
                    }
                }
            }
        }
    }

    /// One scheduling pass: query due monitors and offer per-region jobs.
    pub async fn schedule_due(&self, queue: &mpsc::Sender<CheckJob>) {
        let due = match self.store.due_monitors(OffsetDateTime::now_utc()).await {
            Ok(due) => due,
            Err(e) => {
                warn!(error = %e, "Failed to query due monitors");
                return;
            }
        };

        for monitor in due {
            for region in monitor.regions.0.clone() {
                if !self.known_regions.contains(&region) {
                    warn!(
                        monitor_id = %monitor.id,
                        region = %region,
                        "Monitor references unknown region; skipping"
                    );
                    continue;
                }
                self.offer(
                    queue,
                    CheckJob {
                        monitor: monitor.clone(),
                        region,
                    },
                );
            }
        }
    }

    /// Non-blocking admission; drops on a full queue.
    pub fn offer(&self, queue: &mpsc::Sender<CheckJob>, job: CheckJob) {
        match queue.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.metrics.record_scheduler_drop(
                    &job.monitor.tenant_id,
                    &job.monitor.id.to_string(),
                    &job.region,
                );
                warn!(
                    monitor_id = %job.monitor.id,
                    region = %job.region,
                    "Work queue full, dropping check"
                );
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                debug!(
                    monitor_id = %job.monitor.id,
                    "Work queue closed; scheduler offering into shutdown"
                );
            }
        }
    }
}
