//! Worker pool: a fixed number of cooperative workers consuming check
//! jobs, running probes under a hard deadline and fanning results out to
//! the store, metrics, incident manager and group aggregator.
//!
//! Fan-out consumers are independent: one failing consumer logs its own
//! error and never blocks the others.

use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::name_server::ConnectionProvider;
use time::OffsetDateTime;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::entity::types::CheckStatus;
use crate::entity::{check_result, incident, monitor};
use crate::groups::GroupService;
use crate::incidents::{IncidentService, Transition};
use crate::metrics::Collector;
use crate::notify::{Dispatcher, Notification, should_notify_failure, should_notify_recovery};
use crate::probes::{Prober, effective_timeout};
use crate::scheduler::CheckJob;
use crate::store::Store;

/// Extra wall-clock allowance on top of the probe deadline before the
/// worker abandons the probe future and synthesizes a timeout result.
const DEADLINE_GRACE: Duration = Duration::from_secs(1);

pub struct WorkerPool<P: ConnectionProvider> {
    prober: Arc<Prober<P>>,
    store: Store,
    metrics: Arc<Collector>,
    incidents: Arc<IncidentService>,
    groups: Arc<GroupService>,
    dispatcher: Arc<Dispatcher>,
    config: SchedulerConfig,
}

impl<P: ConnectionProvider + 'static> WorkerPool<P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prober: Arc<Prober<P>>,
        store: Store,
        metrics: Arc<Collector>,
        incidents: Arc<IncidentService>,
        groups: Arc<GroupService>,
        dispatcher: Arc<Dispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            prober,
            store,
            metrics,
            incidents,
            groups,
            dispatcher,
            config,
        }
    }

    /// Spawn `worker_count` workers over one shared queue receiver. Each
    /// worker stops accepting on shutdown and finishes its current job
    /// (bounded by the probe deadline plus grace).
    pub fn spawn(
        self: Arc<Self>,
        queue: mpsc::Receiver<CheckJob>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let queue = Arc::new(Mutex::new(queue));
        (0..self.config.worker_count)
            .map(|worker_id| {
                let pool = self.clone();
                let queue = queue.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    pool.worker_loop(worker_id, queue, shutdown).await;
                })
            })
            .collect()
    }

    async fn worker_loop(
        &self,
        worker_id: usize,
        queue: Arc<Mutex<mpsc::Receiver<CheckJob>>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(worker_id, "Worker started");
        loop {
            // The receiver lock is held only while waiting for the next
            // job; processing happens after release so workers run probes
            // in parallel.
            let job = {
                let mut rx = queue.lock().await;
                tokio::select! {
                    job = rx.recv() => job,
                    _ = wait_for_shutdown(&mut shutdown) => None,
                }
            };
            let Some(job) = job else {
                info!(worker_id, "Worker stopped");
                return;
            };
            self.process(worker_id, job).await;
        }
    }

    /// Run one job end to end: probe, persist, fan out.
    #[tracing::instrument(skip(self, job), fields(worker_id, monitor_id = %job.monitor.id, region = %job.region))]
    async fn process(&self, worker_id: usize, job: CheckJob) {
        let monitor = &job.monitor;
        let deadline = effective_timeout(monitor, self.config.check_timeout());

        let outcome =
            match tokio::time::timeout(deadline + DEADLINE_GRACE, self.prober.run(monitor, deadline))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    debug!(monitor_id = %monitor.id, "Probe overran deadline; synthesizing timeout");
                    crate::probes::ProbeOutcome::timed_out(deadline)
                }
            };

        let result = check_result::Model {
            id: Uuid::new_v4(),
            monitor_id: monitor.id,
            tenant_id: monitor.tenant_id.clone(),
            status: outcome.status,
            response_time_ms: outcome.response_time_ms,
            status_code: outcome.status_code,
            error: outcome.error,
            details: serde_json::Value::Object(outcome.details),
            region: job.region.clone(),
            checked_at: OffsetDateTime::now_utc(),
        };

        // The result write and status-cache upsert are atomic. A failed
        // write is logged; downstream consumers still see the in-memory
        // result, the cache simply lags by one result.
        if let Err(e) = self.store.save_result(result.clone()).await {
            error!(error = %e, monitor_id = %monitor.id, "Failed to save check result");
        }

        self.metrics.record_check(&result, monitor);

        match self.incidents.apply(monitor, &result).await {
            Ok((transition, incident)) => {
                self.handle_notifications(monitor, &result, transition, incident)
                    .await;
            }
            Err(e) => {
                error!(error = %e, monitor_id = %monitor.id, "Failed to process incident");
            }
        }

        // Group memberships resolve at fan-out time with a single query;
        // monitors hold no back-pointers to groups.
        match self.store.groups_for_monitor(monitor.id).await {
            Ok(groups) => {
                for group in groups {
                    if let Err(e) = self.groups.refresh(group.id).await {
                        warn!(
                            error = %e,
                            group_id = %group.id,
                            monitor_id = %monitor.id,
                            "Failed to update group status"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, monitor_id = %monitor.id, "Failed to resolve monitor groups");
            }
        }

        debug!(
            monitor_id = %monitor.id,
            status = ?result.status,
            response_time_ms = result.response_time_ms,
            "Check completed"
        );
    }

    /// Monitor-level notification policy: failure notifications once the
    /// open incident crosses the configured check count (with optional
    /// reminders), and a recovery notification on resolve.
    async fn handle_notifications(
        &self,
        monitor: &monitor::Model,
        result: &check_result::Model,
        transition: Transition,
        incident: Option<incident::Model>,
    ) {
        let config = &monitor.notification_config;
        let Some(incident) = incident else { return };

        match transition {
            Transition::Opened | Transition::Ongoing
                if result.status != CheckStatus::Up && should_notify_failure(config, &incident) =>
            {
                let notification = Notification {
                    tenant_id: monitor.tenant_id.clone(),
                    subject_id: monitor.id,
                    subject_name: monitor.name.clone(),
                    severity: incident.severity,
                    message: result
                        .error
                        .clone()
                        .unwrap_or_else(|| "Monitor is not up".to_string()),
                    recovered: false,
                };
                let delivered = self
                    .dispatcher
                    .send_all(&config.channels, &notification)
                    .await;
                if delivered > 0 {
                    let mut updated = incident;
                    updated.notifications_sent += delivered as i32;
                    if let Err(e) = self.store.update_incident(updated).await {
                        warn!(error = %e, "Failed to record notification count");
                    }
                }
            }
            Transition::Resolved if should_notify_recovery(config) => {
                let notification = Notification {
                    tenant_id: monitor.tenant_id.clone(),
                    subject_id: monitor.id,
                    subject_name: monitor.name.clone(),
                    severity: incident.severity,
                    message: format!(
                        "Monitor recovered after {} minute(s) of downtime",
                        incident.downtime_minutes
                    ),
                    recovered: true,
                };
                self.dispatcher
                    .send_all(&config.channels, &notification)
                    .await;
            }
            _ => {}
        }
    }
}

/// Resolves once the shutdown flag flips to `true`.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
