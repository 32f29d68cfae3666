//! Incident state machine scenarios driven through the sqlite-backed
//! store.

mod common;

use std::sync::Arc;

use time::macros::datetime;
use uuid::Uuid;

use common::{check, monitor, test_db};
use uptime_sentinel::entity::types::{CheckStatus, MonitorKind, Severity};
use uptime_sentinel::error::StoreError;
use uptime_sentinel::incidents::{IncidentService, Transition};
use uptime_sentinel::metrics::Collector;
use uptime_sentinel::store::Store;

async fn service() -> (Store, IncidentService) {
    let db = test_db().await;
    let store = Store::new(db);
    let metrics = Arc::new(Collector::new().unwrap());
    let service = IncidentService::new(store.clone(), metrics);
    (store, service)
}

#[tokio::test]
async fn up_down_down_up_cycle() {
    let (store, service) = service().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let t0 = datetime!(2026-02-01 12:00:00 UTC);
    let t60 = datetime!(2026-02-01 12:01:00 UTC);
    let t120 = datetime!(2026-02-01 12:02:00 UTC);
    let t180 = datetime!(2026-02-01 12:03:00 UTC);

    // t=0: up, nothing happens.
    let (transition, incident) = service
        .apply(&m, &check(&m, CheckStatus::Up, t0))
        .await
        .unwrap();
    assert_eq!(transition, Transition::NoChange);
    assert!(incident.is_none());

    // t=60: first failure opens a critical incident.
    let (transition, incident) = service
        .apply(&m, &check(&m, CheckStatus::Down, t60))
        .await
        .unwrap();
    assert_eq!(transition, Transition::Opened);
    let incident = incident.unwrap();
    assert_eq!(incident.started_at, t60);
    assert_eq!(incident.severity, Severity::Critical);
    assert_eq!(incident.affected_checks, 1);

    // t=120: still failing.
    let (transition, incident) = service
        .apply(&m, &check(&m, CheckStatus::Down, t120))
        .await
        .unwrap();
    assert_eq!(transition, Transition::Ongoing);
    let incident = incident.unwrap();
    assert_eq!(incident.affected_checks, 2);
    assert_eq!(incident.downtime_minutes, 1);

    // t=180: recovery resolves with two minutes of downtime.
    let (transition, incident) = service
        .apply(&m, &check(&m, CheckStatus::Up, t180))
        .await
        .unwrap();
    assert_eq!(transition, Transition::Resolved);
    let incident = incident.unwrap();
    assert_eq!(incident.resolved_at, Some(t180));
    assert_eq!(incident.downtime_minutes, 2);
    assert_eq!(incident.affected_checks, 2);

    // Resolved incident satisfies the duration invariant.
    assert!(incident.resolved_at.unwrap() >= incident.started_at);
    assert_eq!(store.open_incident_count(m.id).await.unwrap(), 0);
}

#[tokio::test]
async fn at_most_one_open_incident_per_monitor() {
    let (store, service) = service().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let base = datetime!(2026-02-01 00:00:00 UTC);
    for i in 0..5 {
        let at = base + time::Duration::minutes(i);
        service
            .apply(&m, &check(&m, CheckStatus::Down, at))
            .await
            .unwrap();
    }
    assert_eq!(store.open_incident_count(m.id).await.unwrap(), 1);
}

#[tokio::test]
async fn degraded_opens_warning_incident() {
    let (store, service) = service().await;
    let m = monitor(MonitorKind::Ssl, 300);
    store.insert_monitor(m.clone()).await.unwrap();

    let (transition, incident) = service
        .apply(
            &m,
            &check(&m, CheckStatus::Degraded, datetime!(2026-02-01 09:00:00 UTC)),
        )
        .await
        .unwrap();
    assert_eq!(transition, Transition::Opened);
    assert_eq!(incident.unwrap().severity, Severity::Warning);
}

#[tokio::test]
async fn acknowledge_is_idempotent_at_state_level_but_errors_on_repeat() {
    let (store, service) = service().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let (_, incident) = service
        .apply(&m, &check(&m, CheckStatus::Down, datetime!(2026-02-01 10:00:00 UTC)))
        .await
        .unwrap();
    let incident_id = incident.unwrap().id;

    let first = service
        .acknowledge(incident_id, &m.tenant_id, "oncall@example.org")
        .await
        .unwrap();
    let acked_at = first.acknowledged_at.unwrap();
    assert_eq!(first.acknowledged_by.as_deref(), Some("oncall@example.org"));

    // Second ack fails explicitly...
    let err = service
        .acknowledge(incident_id, &m.tenant_id, "someone-else@example.org")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyAcknowledged));

    // ...and leaves the original acknowledgement untouched.
    let reread = store.incident(incident_id, &m.tenant_id).await.unwrap();
    assert_eq!(reread.acknowledged_at, Some(acked_at));
    assert_eq!(reread.acknowledged_by.as_deref(), Some("oncall@example.org"));
}

#[tokio::test]
async fn comment_appends_event_without_state_change() {
    let (store, service) = service().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let (_, incident) = service
        .apply(&m, &check(&m, CheckStatus::Down, datetime!(2026-02-01 10:00:00 UTC)))
        .await
        .unwrap();
    let incident_id = incident.unwrap().id;

    service
        .comment(incident_id, &m.tenant_id, "oncall@example.org", "Investigating upstream")
        .await
        .unwrap();

    let events = store.incident_events(incident_id).await.unwrap();
    // detected + comment
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].description, "Investigating upstream");
    assert_eq!(store.open_incident_count(m.id).await.unwrap(), 1);
}

#[tokio::test]
async fn incident_filters_narrow_listings() {
    let (store, service) = service().await;
    let failing = monitor(MonitorKind::Http, 60);
    let degraded = monitor(MonitorKind::Ssl, 300);
    store.insert_monitor(failing.clone()).await.unwrap();
    store.insert_monitor(degraded.clone()).await.unwrap();

    // A resolved critical incident and an open warning incident.
    service
        .apply(&failing, &check(&failing, CheckStatus::Down, datetime!(2026-02-01 10:00:00 UTC)))
        .await
        .unwrap();
    service
        .apply(&failing, &check(&failing, CheckStatus::Up, datetime!(2026-02-01 10:05:00 UTC)))
        .await
        .unwrap();
    service
        .apply(
            &degraded,
            &check(&degraded, CheckStatus::Degraded, datetime!(2026-02-01 11:00:00 UTC)),
        )
        .await
        .unwrap();

    let open = store
        .incidents(&uptime_sentinel::store::IncidentFilters {
            tenant_id: Some(failing.tenant_id.clone()),
            resolved: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].monitor_id, degraded.id);

    let critical = store
        .incidents(&uptime_sentinel::store::IncidentFilters {
            severity: Some(Severity::Critical),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].monitor_id, failing.id);

    let windowed = store
        .incidents(&uptime_sentinel::store::IncidentFilters {
            started_after: Some(datetime!(2026-02-01 10:30:00 UTC)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].monitor_id, degraded.id);
}

#[tokio::test]
async fn acknowledging_foreign_tenant_incident_is_not_found() {
    let (store, service) = service().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let (_, incident) = service
        .apply(&m, &check(&m, CheckStatus::Down, datetime!(2026-02-01 10:00:00 UTC)))
        .await
        .unwrap();

    let err = service
        .acknowledge(incident.unwrap().id, "other-tenant", "x@example.org")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let err = service
        .acknowledge(Uuid::new_v4(), &m.tenant_id, "x@example.org")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}
