//! Per-monitor incident state machine.
//!
//! Driven by successive check results: a non-up result opens (or extends)
//! the monitor's single unresolved incident, an up result resolves it.
//! Transitions are serialized per monitor through a lock map so parallel
//! workers cannot race the read-modify-write.
//!
//! The transition clock is the result's `checked_at` stamp, which keeps
//! replayed and multi-region results deterministic.

use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::entity::types::{CheckStatus, IncidentEventKind, Severity};
use crate::entity::{check_result, incident, incident_event, monitor};
use crate::error::StoreError;
use crate::metrics::Collector;
use crate::store::Store;

/// What [`IncidentService::apply`] did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First non-up result: a new incident was opened.
    Opened,
    /// Another non-up result against an already-open incident.
    Ongoing,
    /// Up result closed the open incident.
    Resolved,
    /// Up result with nothing open.
    NoChange,
}

pub struct IncidentService {
    store: Store,
    metrics: Arc<Collector>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl IncidentService {
    pub fn new(store: Store, metrics: Arc<Collector>) -> Self {
        Self {
            store,
            metrics,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, monitor_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(monitor_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Feed one result through the state machine. Returns the transition
    /// taken and the incident as it stands afterwards (if any).
    #[tracing::instrument(skip(self, monitor, result), fields(monitor_id = %monitor.id))]
    pub async fn apply(
        &self,
        monitor: &monitor::Model,
        result: &check_result::Model,
    ) -> Result<(Transition, Option<incident::Model>), StoreError> {
        let lock = self.lock_for(monitor.id);
        let _guard = lock.lock().await;

        let active = self.store.active_incident(monitor.id).await?;

        match (result.status, active) {
            (CheckStatus::Up, None) => Ok((Transition::NoChange, None)),
            (CheckStatus::Up, Some(open)) => {
                let resolved = self.resolve(open, monitor, result.checked_at).await?;
                Ok((Transition::Resolved, Some(resolved)))
            }
            (_, None) => {
                let opened = self.open(monitor, result).await?;
                Ok((Transition::Opened, Some(opened)))
            }
            (_, Some(open)) => {
                let updated = self.extend(open, result.checked_at).await?;
                Ok((Transition::Ongoing, Some(updated)))
            }
        }
    }

    async fn open(
        &self,
        monitor: &monitor::Model,
        result: &check_result::Model,
    ) -> Result<incident::Model, StoreError> {
        let model = incident::Model {
            id: Uuid::new_v4(),
            monitor_id: monitor.id,
            tenant_id: monitor.tenant_id.clone(),
            started_at: result.checked_at,
            resolved_at: None,
            severity: severity_for(result.status),
            downtime_minutes: 0,
            affected_checks: 1,
            notifications_sent: 0,
            acknowledged_at: None,
            acknowledged_by: None,
        };
        self.store.insert_incident(model.clone()).await?;

        let error = result.error.clone().unwrap_or_default();
        self.store
            .insert_incident_event(incident_event::Model {
                id: Uuid::new_v4(),
                incident_id: model.id,
                kind: IncidentEventKind::Detected,
                event_time: result.checked_at,
                description: format!("Monitor down detected: {error}"),
                created_by: None,
                metadata: serde_json::json!({
                    "status_code": result.status_code,
                    "response_time_ms": result.response_time_ms,
                    "error": result.error,
                    "region": result.region,
                }),
            })
            .await?;

        self.metrics.record_incident_opened(&model, monitor);
        info!(incident_id = %model.id, monitor_id = %monitor.id, "Opened incident");
        Ok(model)
    }

    async fn extend(
        &self,
        mut open: incident::Model,
        checked_at: OffsetDateTime,
    ) -> Result<incident::Model, StoreError> {
        open.affected_checks += 1;
        open.downtime_minutes = minutes_between(open.started_at, checked_at);
        self.store.update_incident(open.clone()).await?;
        Ok(open)
    }

    async fn resolve(
        &self,
        mut open: incident::Model,
        monitor: &monitor::Model,
        resolved_at: OffsetDateTime,
    ) -> Result<incident::Model, StoreError> {
        open.resolved_at = Some(resolved_at);
        open.downtime_minutes = minutes_between(open.started_at, resolved_at);
        self.store.update_incident(open.clone()).await?;

        self.store
            .insert_incident_event(incident_event::Model {
                id: Uuid::new_v4(),
                incident_id: open.id,
                kind: IncidentEventKind::Resolved,
                event_time: resolved_at,
                description: "Monitor recovered and is now operational".to_string(),
                created_by: None,
                metadata: serde_json::json!({
                    "downtime_minutes": open.downtime_minutes,
                    "affected_checks": open.affected_checks,
                }),
            })
            .await?;

        self.metrics.record_incident_resolved(&open, monitor);
        info!(
            incident_id = %open.id,
            monitor_id = %monitor.id,
            downtime_minutes = open.downtime_minutes,
            "Resolved incident"
        );
        Ok(open)
    }

    /// Acknowledge an incident: first call stamps `acknowledged_at`/`_by`
    /// and records MTTA; any repeat fails with
    /// [`StoreError::AlreadyAcknowledged`] while leaving the state
    /// untouched.
    pub async fn acknowledge(
        &self,
        incident_id: Uuid,
        tenant_id: &str,
        user: &str,
    ) -> Result<incident::Model, StoreError> {
        let mut incident = self.store.incident(incident_id, tenant_id).await?;
        if incident.acknowledged_at.is_some() {
            return Err(StoreError::AlreadyAcknowledged);
        }

        let now = OffsetDateTime::now_utc();
        incident.acknowledged_at = Some(now);
        incident.acknowledged_by = Some(user.to_string());
        self.store.update_incident(incident.clone()).await?;

        self.store
            .insert_incident_event(incident_event::Model {
                id: Uuid::new_v4(),
                incident_id,
                kind: IncidentEventKind::Acknowledged,
                event_time: now,
                description: format!("Incident acknowledged by {user}"),
                created_by: Some(user.to_string()),
                metadata: serde_json::json!({}),
            })
            .await?;

        if let Some(monitor) = self.store.monitor(incident.monitor_id).await? {
            self.metrics.record_incident_acknowledged(&incident, &monitor);
        }
        Ok(incident)
    }

    /// Append a comment event; no state change.
    pub async fn comment(
        &self,
        incident_id: Uuid,
        tenant_id: &str,
        user: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let incident = self.store.incident(incident_id, tenant_id).await?;
        self.store
            .insert_incident_event(incident_event::Model {
                id: Uuid::new_v4(),
                incident_id: incident.id,
                kind: IncidentEventKind::Comment,
                event_time: OffsetDateTime::now_utc(),
                description: text.to_string(),
                created_by: Some(user.to_string()),
                metadata: serde_json::json!({}),
            })
            .await
    }
}

/// Severity of a fresh incident from the triggering status.
pub fn severity_for(status: CheckStatus) -> Severity {
    match status {
        CheckStatus::Down => Severity::Critical,
        CheckStatus::Degraded => Severity::Warning,
        CheckStatus::Up => Severity::Info,
    }
}

/// Whole minutes between two instants, floored.
pub fn minutes_between(start: OffsetDateTime, end: OffsetDateTime) -> i64 {
    (end - start).whole_minutes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn severity_mapping() {
        assert_eq!(severity_for(CheckStatus::Down), Severity::Critical);
        assert_eq!(severity_for(CheckStatus::Degraded), Severity::Warning);
        assert_eq!(severity_for(CheckStatus::Up), Severity::Info);
    }

    #[test]
    fn minutes_are_floored() {
        let start = datetime!(2026-01-01 00:00:00 UTC);
        assert_eq!(minutes_between(start, datetime!(2026-01-01 00:02:00 UTC)), 2);
        assert_eq!(minutes_between(start, datetime!(2026-01-01 00:02:59 UTC)), 2);
        assert_eq!(minutes_between(start, datetime!(2026-01-01 00:00:30 UTC)), 0);
    }
}
