//! SLA calculator scenarios: monitor reports, group calculation methods
//! and report idempotence.

mod common;

use std::sync::Arc;

use time::macros::datetime;
use time::OffsetDateTime;
use uuid::Uuid;

use common::{check, group, member, monitor, test_db};
use uptime_sentinel::entity::types::{CalculationMethod, CheckStatus, MonitorKind};
use uptime_sentinel::entity::{monitor_group_slo, monitor_slo};
use uptime_sentinel::metrics::Collector;
use uptime_sentinel::sla::SlaCalculator;
use uptime_sentinel::store::Store;

async fn harness() -> (Store, SlaCalculator) {
    let db = test_db().await;
    let store = Store::new(db);
    let metrics = Arc::new(Collector::new().unwrap());
    let calculator = SlaCalculator::new(store.clone(), metrics);
    (store, calculator)
}

fn slo(monitor_id: Uuid, target: f64) -> monitor_slo::Model {
    monitor_slo::Model {
        id: Uuid::new_v4(),
        monitor_id,
        tenant_id: "tenant-1".to_string(),
        target_uptime_percentage: target,
        measurement_period_days: 30,
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

fn group_slo(
    group_id: Uuid,
    target: f64,
    method: CalculationMethod,
) -> monitor_group_slo::Model {
    monitor_group_slo::Model {
        id: Uuid::new_v4(),
        group_id,
        tenant_id: "tenant-1".to_string(),
        target_uptime_percentage: target,
        measurement_period_days: 30,
        calculation_method: method,
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

#[tokio::test]
async fn monitor_report_counts_and_downtime() {
    let (store, calculator) = harness().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let base = datetime!(2026-05-01 00:00:00 UTC);
    let pattern = [
        CheckStatus::Up,
        CheckStatus::Down,
        CheckStatus::Down,
        CheckStatus::Up,
    ];
    for (i, status) in pattern.iter().enumerate() {
        store
            .save_result(check(&m, *status, base + time::Duration::minutes(i as i64)))
            .await
            .unwrap();
    }

    let report = calculator
        .monitor_report(m.id, base, base + time::Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(report.total_checks, 4);
    assert_eq!(report.successful_checks, 2);
    assert_eq!(report.failed_checks, 2);
    assert!((report.uptime_percentage - 50.0).abs() < 1e-9);
    assert_eq!(report.downtime_minutes, 2);
    assert_eq!(report.average_response_time_ms, Some(120));
    // No SLO configured: met by definition.
    assert!(report.slo_met);

    // Uptime% plus outage-derived downtime stays consistent.
    let period_minutes = 60.0;
    let outage_pct = report.downtime_minutes as f64 / period_minutes * 100.0;
    assert!(report.uptime_percentage + outage_pct <= 100.0 + 1e-6);
}

#[tokio::test]
async fn slo_target_controls_slo_met() {
    let (store, calculator) = harness().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();
    store.upsert_monitor_slo(slo(m.id, 99.9)).await.unwrap();

    let base = datetime!(2026-05-01 00:00:00 UTC);
    // 3 of 4 up: 75% < 99.9%.
    for (i, status) in [
        CheckStatus::Up,
        CheckStatus::Up,
        CheckStatus::Down,
        CheckStatus::Up,
    ]
    .iter()
    .enumerate()
    {
        store
            .save_result(check(&m, *status, base + time::Duration::minutes(i as i64)))
            .await
            .unwrap();
    }

    let report = calculator
        .monitor_report(m.id, base, base + time::Duration::hours(1))
        .await
        .unwrap();
    assert!(!report.slo_met);
}

#[tokio::test]
async fn report_recomputation_replaces_existing_row() {
    let (store, calculator) = harness().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let base = datetime!(2026-05-01 00:00:00 UTC);
    let end = base + time::Duration::hours(1);
    store
        .save_result(check(&m, CheckStatus::Up, base))
        .await
        .unwrap();

    calculator.monitor_report(m.id, base, end).await.unwrap();

    // More data arrives; recomputing the same period replaces the row.
    store
        .save_result(check(&m, CheckStatus::Down, base + time::Duration::minutes(5)))
        .await
        .unwrap();
    calculator.monitor_report(m.id, base, end).await.unwrap();

    let reports = store.sla_reports(m.id, 10).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].total_checks, 2);
}

#[tokio::test]
async fn empty_period_is_an_error() {
    let (store, calculator) = harness().await;
    let m = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m.clone()).await.unwrap();

    let base = datetime!(2026-05-01 00:00:00 UTC);
    assert!(calculator
        .monitor_report(m.id, base, base + time::Duration::hours(1))
        .await
        .is_err());
}

#[tokio::test]
async fn group_worst_case_takes_minimum() {
    let (store, calculator) = harness().await;

    let steady = monitor(MonitorKind::Http, 60);
    let flaky = monitor(MonitorKind::Http, 60);
    store.insert_monitor(steady.clone()).await.unwrap();
    store.insert_monitor(flaky.clone()).await.unwrap();

    let g = group(&steady.tenant_id);
    store
        .create_group(
            g.clone(),
            vec![member(&g, &steady, 0.5, false), member(&g, &flaky, 0.5, true)],
        )
        .await
        .unwrap();
    store
        .upsert_group_slo(group_slo(g.id, 99.9, CalculationMethod::WorstCase))
        .await
        .unwrap();

    let base = datetime!(2026-05-01 00:00:00 UTC);
    // steady: 2/2 up = 100%; flaky: 1/2 up = 50%.
    store.save_result(check(&steady, CheckStatus::Up, base)).await.unwrap();
    store
        .save_result(check(&steady, CheckStatus::Up, base + time::Duration::minutes(1)))
        .await
        .unwrap();
    store.save_result(check(&flaky, CheckStatus::Up, base)).await.unwrap();
    store
        .save_result(check(&flaky, CheckStatus::Down, base + time::Duration::minutes(1)))
        .await
        .unwrap();

    let report = calculator
        .group_report(g.id, base, base + time::Duration::hours(1))
        .await
        .unwrap();
    assert!((report.uptime_percentage - 50.0).abs() < 1e-9);
    assert!(!report.slo_met);
}

#[tokio::test]
async fn group_weighted_average_uses_member_weights() {
    let (store, calculator) = harness().await;

    let m1 = monitor(MonitorKind::Http, 60);
    let m2 = monitor(MonitorKind::Http, 60);
    store.insert_monitor(m1.clone()).await.unwrap();
    store.insert_monitor(m2.clone()).await.unwrap();

    let g = group(&m1.tenant_id);
    store
        .create_group(
            g.clone(),
            vec![member(&g, &m1, 0.8, false), member(&g, &m2, 0.2, false)],
        )
        .await
        .unwrap();
    store
        .upsert_group_slo(group_slo(g.id, 90.0, CalculationMethod::WeightedAverage))
        .await
        .unwrap();

    let base = datetime!(2026-05-01 00:00:00 UTC);
    // m1: 100%, m2: 0%. Weighted: 80%.
    store.save_result(check(&m1, CheckStatus::Up, base)).await.unwrap();
    store.save_result(check(&m2, CheckStatus::Down, base)).await.unwrap();

    let report = calculator
        .group_report(g.id, base, base + time::Duration::hours(1))
        .await
        .unwrap();
    assert!((report.uptime_percentage - 80.0).abs() < 1e-9);
    assert!(!report.slo_met);

    // Idempotence holds for group reports too.
    calculator
        .group_report(g.id, base, base + time::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(store.group_sla_reports(g.id, 10).await.unwrap().len(), 1);
}
