//! SLA calculation: uptime percentage, downtime streaks and SLO
//! compliance for monitors and groups.
//!
//! Reports are idempotent per `(subject, period_start, period_end)`:
//! recomputation replaces the stored row.

use std::sync::Arc;

use time::{Date, Month, OffsetDateTime, Time};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::types::{CalculationMethod, CheckStatus};
use crate::entity::{check_result, monitor_group_sla_report, sla_report};
use crate::error::StoreError;
use crate::metrics::Collector;
use crate::store::Store;

/// Sum of contiguous down-streak durations over an ascending result
/// sequence. A streak opens on the first non-up result, closes on the
/// next up result, and an open streak at period end contributes up to
/// `stream_end`.
pub fn downtime_minutes(checks: &[check_result::Model], stream_end: OffsetDateTime) -> i64 {
    let mut total = 0;
    let mut streak_start: Option<OffsetDateTime> = None;

    for check in checks {
        match (check.status, streak_start) {
            (CheckStatus::Up, Some(start)) => {
                total += (check.checked_at - start).whole_minutes();
                streak_start = None;
            }
            (CheckStatus::Up, None) => {}
            (_, None) => streak_start = Some(check.checked_at),
            (_, Some(_)) => {}
        }
    }

    if let Some(start) = streak_start {
        total += (stream_end - start).whole_minutes().max(0);
    }
    total
}

/// Latency distribution over a result set. Percentiles use the
/// nearest-rank definition over an explicitly sorted sample:
/// the `ceil(p/100 · n)`-th order statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub average_ms: Option<i32>,
    pub p50_ms: Option<i32>,
    pub p95_ms: Option<i32>,
    pub p99_ms: Option<i32>,
}

/// Summarize response times of successful checks only.
pub fn summarize_latencies(checks: &[check_result::Model]) -> LatencySummary {
    let mut samples: Vec<i32> = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Up)
        .map(|c| c.response_time_ms)
        .collect();
    samples.sort_unstable();

    if samples.is_empty() {
        return LatencySummary {
            average_ms: None,
            p50_ms: None,
            p95_ms: None,
            p99_ms: None,
        };
    }

    let sum: i64 = samples.iter().map(|&v| i64::from(v)).sum();
    let average = (sum / samples.len() as i64) as i32;
    LatencySummary {
        average_ms: Some(average),
        p50_ms: nearest_rank(&samples, 50.0),
        p95_ms: nearest_rank(&samples, 95.0),
        p99_ms: nearest_rank(&samples, 99.0),
    }
}

/// Nearest-rank percentile over an ascending-sorted sample.
pub fn nearest_rank(sorted: &[i32], percentile: f64) -> Option<i32> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

/// Member uptime as `successful / total · 100`, `None` without checks.
fn uptime_of(checks: &[check_result::Model]) -> Option<f64> {
    if checks.is_empty() {
        return None;
    }
    let up = checks.iter().filter(|c| c.status == CheckStatus::Up).count();
    Some(up as f64 / checks.len() as f64 * 100.0)
}

/// Compose member uptimes per the group's calculation method. Members
/// without checks in the period are excluded.
pub fn compose_group_uptime(
    member_uptimes: &[(f64, bool, Option<f64>)],
    method: CalculationMethod,
) -> f64 {
    match method {
        CalculationMethod::WeightedAverage => {
            let mut total_weight = 0.0;
            let mut weighted = 0.0;
            for (weight, _, uptime) in member_uptimes {
                if let Some(uptime) = uptime {
                    weighted += uptime * weight;
                    total_weight += weight;
                }
            }
            if total_weight > 0.0 {
                weighted / total_weight
            } else {
                0.0
            }
        }
        CalculationMethod::WorstCase => member_uptimes
            .iter()
            .filter_map(|(_, _, uptime)| *uptime)
            .fold(100.0, f64::min),
        CalculationMethod::CriticalOnly => {
            let critical: Vec<f64> = member_uptimes
                .iter()
                .filter(|(_, is_critical, uptime)| *is_critical && uptime.is_some())
                .map(|(_, _, uptime)| uptime.unwrap())
                .collect();
            if critical.is_empty() {
                0.0
            } else {
                critical.iter().sum::<f64>() / critical.len() as f64
            }
        }
    }
}

pub struct SlaCalculator {
    store: Store,
    metrics: Arc<Collector>,
}

impl SlaCalculator {
    pub fn new(store: Store, metrics: Arc<Collector>) -> Self {
        Self { store, metrics }
    }

    /// Compute and persist a monitor's report for `[start, end]`.
    #[tracing::instrument(skip(self), fields(monitor_id = %monitor_id))]
    pub async fn monitor_report(
        &self,
        monitor_id: Uuid,
        period_start: OffsetDateTime,
        period_end: OffsetDateTime,
    ) -> Result<sla_report::Model, StoreError> {
        let monitor = self
            .store
            .monitor(monitor_id)
            .await?
            .ok_or(StoreError::NotFound("monitor"))?;
        let checks = self
            .store
            .results_in(monitor_id, period_start, period_end)
            .await?;
        if checks.is_empty() {
            return Err(StoreError::NotFound("check results in period"));
        }

        let now = OffsetDateTime::now_utc();
        let stream_end = period_end.min(now);

        let total = checks.len() as i64;
        let successful = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Up)
            .count() as i64;
        let uptime_percentage = successful as f64 / total as f64 * 100.0;
        let downtime = downtime_minutes(&checks, stream_end);
        let latency = summarize_latencies(&checks);

        let slo = self.store.monitor_slo(monitor_id).await?;
        let slo_met = slo
            .as_ref()
            .is_none_or(|slo| uptime_percentage >= slo.target_uptime_percentage);

        let report = sla_report::Model {
            id: Uuid::new_v4(),
            monitor_id,
            tenant_id: monitor.tenant_id.clone(),
            period_start,
            period_end,
            total_checks: total,
            successful_checks: successful,
            failed_checks: total - successful,
            uptime_percentage,
            downtime_minutes: downtime,
            average_response_time_ms: latency.average_ms,
            slo_met,
            created_at: now,
        };
        self.store.upsert_sla_report(report.clone()).await?;

        let period_minutes = (period_end - period_start).as_seconds_f64() / 60.0;
        self.metrics.record_sla_report(
            &monitor.tenant_id,
            &monitor_id.to_string(),
            &monitor.name,
            uptime_percentage,
            downtime,
            period_minutes,
            slo.map(|s| s.target_uptime_percentage),
            slo_met,
        );
        Ok(report)
    }

    /// Compute and persist a group's report for `[start, end]` using the
    /// group SLO's calculation method (weighted average when no SLO is
    /// configured).
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn group_report(
        &self,
        group_id: Uuid,
        period_start: OffsetDateTime,
        period_end: OffsetDateTime,
    ) -> Result<monitor_group_sla_report::Model, StoreError> {
        let group = self
            .store
            .group(group_id)
            .await?
            .ok_or(StoreError::NotFound("monitor group"))?;
        let slo = self.store.group_slo(group_id).await?;
        let method = slo
            .as_ref()
            .map_or(CalculationMethod::WeightedAverage, |s| s.calculation_method);

        let members = self.store.group_members(group_id).await?;
        let mut member_uptimes = Vec::with_capacity(members.len());
        for member in &members {
            let checks = self
                .store
                .results_in(member.monitor_id, period_start, period_end)
                .await?;
            member_uptimes.push((member.weight, member.is_critical, uptime_of(&checks)));
        }
        let uptime_percentage = compose_group_uptime(&member_uptimes, method);

        // Health-score average approximated by the current snapshot, and
        // downtime derived from group incidents overlapping the period.
        let health_score_average = self
            .store
            .group_status(group_id)
            .await?
            .map_or(0.0, |s| s.health_score);

        let incidents = self.store.group_incidents(group_id, 1000).await?;
        let mut incidents_count = 0;
        let mut downtime = 0;
        for incident in incidents {
            if incident.started_at >= period_start && incident.started_at <= period_end {
                incidents_count += 1;
                let end = incident
                    .resolved_at
                    .filter(|t| *t < period_end)
                    .unwrap_or(period_end);
                downtime += (end - incident.started_at).whole_minutes().max(0);
            }
        }

        let slo_met = slo
            .as_ref()
            .is_none_or(|slo| uptime_percentage >= slo.target_uptime_percentage);

        let report = monitor_group_sla_report::Model {
            id: Uuid::new_v4(),
            group_id,
            tenant_id: group.tenant_id.clone(),
            period_start,
            period_end,
            health_score_average,
            uptime_percentage,
            downtime_minutes: downtime,
            incidents_count,
            slo_met,
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.upsert_group_sla_report(report.clone()).await?;

        let period_minutes = (period_end - period_start).as_seconds_f64() / 60.0;
        self.metrics.record_sla_report(
            &group.tenant_id,
            &group_id.to_string(),
            &group.name,
            uptime_percentage,
            downtime,
            period_minutes,
            slo.map(|s| s.target_uptime_percentage),
            slo_met,
        );
        Ok(report)
    }

    /// Roll up previous-month reports for every monitor and group that
    /// carries an SLO.
    pub async fn rollup_previous_month(&self, now: OffsetDateTime) -> Result<(), StoreError> {
        let (start, end) = previous_month_bounds(now);
        info!(%start, %end, "Running monthly SLA rollup");

        for slo in self.store.all_monitor_slos().await? {
            if let Err(e) = self.monitor_report(slo.monitor_id, start, end).await {
                warn!(monitor_id = %slo.monitor_id, error = %e, "Monthly rollup skipped monitor");
            }
        }
        for slo in self.store.all_group_slos().await? {
            if let Err(e) = self.group_report(slo.group_id, start, end).await {
                warn!(group_id = %slo.group_id, error = %e, "Monthly rollup skipped group");
            }
        }
        Ok(())
    }
}

/// `[first instant, last instant]` of the month preceding `now`.
pub fn previous_month_bounds(now: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    let (prev_year, prev_month) = match now.month() {
        Month::January => (now.year() - 1, Month::December),
        month => (now.year(), month.previous()),
    };
    let start = Date::from_calendar_date(prev_year, prev_month, 1)
        .expect("first of month is always valid")
        .with_time(Time::MIDNIGHT)
        .assume_utc();
    let end = Date::from_calendar_date(now.year(), now.month(), 1)
        .expect("first of month is always valid")
        .with_time(Time::MIDNIGHT)
        .assume_utc()
        - time::Duration::seconds(1);
    (start, end)
}

/// Background task: at every tick, run the rollup once per month
/// boundary crossing.
pub async fn monthly_rollup_loop(calculator: Arc<SlaCalculator>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
    let mut last_rolled: Option<(i32, Month)> = None;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = OffsetDateTime::now_utc();
                let current = (now.year(), now.month());
                if last_rolled != Some(current) {
                    if let Err(e) = calculator.rollup_previous_month(now).await {
                        warn!(error = %e, "Monthly SLA rollup failed");
                    }
                    last_rolled = Some(current);
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn check(status: CheckStatus, at: OffsetDateTime, response_time_ms: i32) -> check_result::Model {
        check_result::Model {
            id: Uuid::new_v4(),
            monitor_id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            status,
            response_time_ms,
            status_code: None,
            error: None,
            details: serde_json::json!({}),
            region: "us-east".into(),
            checked_at: at,
        }
    }

    #[test]
    fn downtime_streak_closes_on_recovery() {
        let checks = vec![
            check(CheckStatus::Up, datetime!(2026-01-01 00:00:00 UTC), 100),
            check(CheckStatus::Down, datetime!(2026-01-01 00:01:00 UTC), 0),
            check(CheckStatus::Down, datetime!(2026-01-01 00:02:00 UTC), 0),
            check(CheckStatus::Up, datetime!(2026-01-01 00:03:00 UTC), 100),
        ];
        assert_eq!(
            downtime_minutes(&checks, datetime!(2026-01-01 01:00:00 UTC)),
            2
        );
    }

    #[test]
    fn open_streak_runs_to_stream_end() {
        let checks = vec![
            check(CheckStatus::Up, datetime!(2026-01-01 00:00:00 UTC), 100),
            check(CheckStatus::Down, datetime!(2026-01-01 00:10:00 UTC), 0),
        ];
        assert_eq!(
            downtime_minutes(&checks, datetime!(2026-01-01 00:25:30 UTC)),
            15
        );
    }

    #[test]
    fn degraded_counts_toward_downtime_streaks() {
        let checks = vec![
            check(CheckStatus::Degraded, datetime!(2026-01-01 00:00:00 UTC), 0),
            check(CheckStatus::Up, datetime!(2026-01-01 00:05:00 UTC), 100),
        ];
        assert_eq!(
            downtime_minutes(&checks, datetime!(2026-01-01 01:00:00 UTC)),
            5
        );
    }

    #[test]
    fn percentiles_sort_then_nearest_rank() {
        // Deliberately unsorted input: the summary must sort first.
        let times = [500, 100, 300, 200, 400];
        let checks: Vec<_> = times
            .iter()
            .enumerate()
            .map(|(i, &ms)| {
                check(
                    CheckStatus::Up,
                    datetime!(2026-01-01 00:00:00 UTC) + time::Duration::minutes(i as i64),
                    ms,
                )
            })
            .collect();
        let summary = summarize_latencies(&checks);
        assert_eq!(summary.average_ms, Some(300));
        assert_eq!(summary.p50_ms, Some(300));
        assert_eq!(summary.p95_ms, Some(500));
        assert_eq!(summary.p99_ms, Some(500));
    }

    #[test]
    fn latency_summary_ignores_failed_checks() {
        let checks = vec![
            check(CheckStatus::Up, datetime!(2026-01-01 00:00:00 UTC), 100),
            check(CheckStatus::Down, datetime!(2026-01-01 00:01:00 UTC), 9000),
        ];
        let summary = summarize_latencies(&checks);
        assert_eq!(summary.average_ms, Some(100));
    }

    #[test]
    fn nearest_rank_single_sample() {
        assert_eq!(nearest_rank(&[42], 50.0), Some(42));
        assert_eq!(nearest_rank(&[42], 99.0), Some(42));
        assert_eq!(nearest_rank(&[], 50.0), None);
    }

    #[test]
    fn worst_case_takes_minimum_member_uptime() {
        let uptimes = vec![
            (0.5, false, Some(99.99)),
            (0.3, false, Some(99.50)),
            (0.2, true, Some(100.0)),
        ];
        let uptime = compose_group_uptime(&uptimes, CalculationMethod::WorstCase);
        assert!((uptime - 99.50).abs() < 1e-9);
    }

    #[test]
    fn weighted_average_skips_members_without_checks() {
        let uptimes = vec![(0.5, false, Some(100.0)), (0.5, false, None)];
        let uptime = compose_group_uptime(&uptimes, CalculationMethod::WeightedAverage);
        assert!((uptime - 100.0).abs() < 1e-9);
    }

    #[test]
    fn critical_only_averages_critical_members() {
        let uptimes = vec![
            (0.4, true, Some(98.0)),
            (0.4, true, Some(100.0)),
            (0.2, false, Some(10.0)),
        ];
        let uptime = compose_group_uptime(&uptimes, CalculationMethod::CriticalOnly);
        assert!((uptime - 99.0).abs() < 1e-9);
    }

    #[test]
    fn previous_month_bounds_cross_year() {
        let (start, end) = previous_month_bounds(datetime!(2026-01-15 10:00:00 UTC));
        assert_eq!(start, datetime!(2025-12-01 00:00:00 UTC));
        assert_eq!(end, datetime!(2025-12-31 23:59:59 UTC));
    }

    #[test]
    fn previous_month_bounds_mid_year() {
        let (start, end) = previous_month_bounds(datetime!(2026-03-10 00:00:00 UTC));
        assert_eq!(start, datetime!(2026-02-01 00:00:00 UTC));
        assert_eq!(end, datetime!(2026-02-28 23:59:59 UTC));
    }
}
