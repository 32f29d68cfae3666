//! Group aggregation: weighted health score, overall status, alert-rule
//! evaluation and group-level incidents.
//!
//! Aggregation is a pure function of `(members, weights, critical flags,
//! statuses)`; the service around it persists the snapshot, evaluates
//! rules in declared order (first match wins) and opens/resolves the
//! group's single unresolved incident.

use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::types::{
    CheckStatus, NotificationChannel, Severity, TriggerCondition, UuidList,
};
use crate::entity::{
    monitor_group, monitor_group_alert_rule, monitor_group_incident, monitor_group_status,
};
use crate::error::StoreError;
use crate::metrics::Collector;
use crate::notify::{Dispatcher, Notification};
use crate::store::Store;

/// One member's inputs to aggregation. `status: None` means the monitor
/// has no cached status yet and is penalized as degraded.
#[derive(Debug, Clone)]
pub struct MemberState {
    pub monitor_id: Uuid,
    pub name: String,
    pub weight: f64,
    pub is_critical: bool,
    pub status: Option<CheckStatus>,
}

impl MemberState {
    fn effective_status(&self) -> CheckStatus {
        self.status.unwrap_or(CheckStatus::Degraded)
    }
}

/// Computed group state before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub health_score: f64,
    pub overall_status: CheckStatus,
    pub monitors_up: i32,
    pub monitors_down: i32,
    pub monitors_degraded: i32,
    pub critical_monitors_down: i32,
    pub message: String,
}

/// Aggregate member states into a snapshot. Deterministic: no clock, no
/// I/O.
pub fn aggregate(members: &[MemberState]) -> Snapshot {
    if members.is_empty() {
        return Snapshot {
            health_score: 0.0,
            overall_status: CheckStatus::Degraded,
            monitors_up: 0,
            monitors_down: 0,
            monitors_degraded: 0,
            critical_monitors_down: 0,
            message: "No monitors in group".to_string(),
        };
    }

    let mut up = 0;
    let mut down = 0;
    let mut degraded = 0;
    let mut critical_down = 0;
    let mut total_weight = 0.0;
    let mut weighted_score = 0.0;

    for member in members {
        let status = member.effective_status();
        total_weight += member.weight;
        weighted_score += member.weight * status.health_points();
        match status {
            CheckStatus::Up => up += 1,
            CheckStatus::Down => {
                down += 1;
                if member.is_critical {
                    critical_down += 1;
                }
            }
            CheckStatus::Degraded => degraded += 1,
        }
    }

    let health_score = if total_weight > 0.0 {
        (weighted_score / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let overall_status = if critical_down > 0 {
        CheckStatus::Down
    } else if down > 0 || degraded > 0 {
        CheckStatus::Degraded
    } else {
        CheckStatus::Up
    };

    let mut snapshot = Snapshot {
        health_score,
        overall_status,
        monitors_up: up,
        monitors_down: down,
        monitors_degraded: degraded,
        critical_monitors_down: critical_down,
        message: String::new(),
    };
    snapshot.message = status_message(&snapshot, members);
    snapshot
}

fn status_message(snapshot: &Snapshot, members: &[MemberState]) -> String {
    if snapshot.overall_status == CheckStatus::Up {
        return "All monitors operational".to_string();
    }
    if snapshot.critical_monitors_down > 0 {
        let critical_down: Vec<&str> = members
            .iter()
            .filter(|m| m.is_critical && m.effective_status() == CheckStatus::Down)
            .map(|m| m.name.as_str())
            .filter(|name| !name.is_empty())
            .collect();
        if critical_down.is_empty() {
            return "Critical monitors are down".to_string();
        }
        return format!("Critical monitors down: {}", critical_down.join(", "));
    }
    if snapshot.monitors_down > 0 {
        return format!(
            "{} monitor(s) down, {} operational",
            snapshot.monitors_down, snapshot.monitors_up
        );
    }
    if snapshot.monitors_degraded > 0 {
        return format!("{} monitor(s) degraded", snapshot.monitors_degraded);
    }
    "Unknown status".to_string()
}

/// Does one rule fire against the snapshot?
pub fn rule_matches(rule: &monitor_group_alert_rule::Model, snapshot: &Snapshot) -> bool {
    match rule.trigger_condition {
        TriggerCondition::HealthScoreBelow => rule
            .threshold_value
            .is_some_and(|threshold| snapshot.health_score < threshold),
        TriggerCondition::AnyCriticalDown => snapshot.critical_monitors_down > 0,
        TriggerCondition::PercentageDown => rule.threshold_value.is_some_and(|threshold| {
            let total =
                snapshot.monitors_up + snapshot.monitors_down + snapshot.monitors_degraded;
            total > 0
                && f64::from(snapshot.monitors_down) / f64::from(total) * 100.0 >= threshold
        }),
        TriggerCondition::AllDown => snapshot.monitors_up == 0 && snapshot.monitors_down > 0,
    }
}

/// Rules evaluate in declared order; disabled rules are skipped; the
/// first match wins.
pub fn first_matching<'a>(
    rules: &'a [monitor_group_alert_rule::Model],
    snapshot: &Snapshot,
) -> Option<&'a monitor_group_alert_rule::Model> {
    rules
        .iter()
        .filter(|rule| rule.enabled)
        .find(|rule| rule_matches(rule, snapshot))
}

/// Group incident severity ladder.
pub fn incident_severity(snapshot: &Snapshot) -> Severity {
    if snapshot.critical_monitors_down > 0 || snapshot.health_score < 50.0 {
        Severity::Critical
    } else if snapshot.monitors_down > 0 || snapshot.health_score < 80.0 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

pub struct GroupService {
    store: Store,
    metrics: Arc<Collector>,
    dispatcher: Arc<Dispatcher>,
    /// `(group, rule) -> last notification time` for cooldown
    /// suppression. Intentionally in-memory: a restart simply allows the
    /// next notification early.
    cooldowns: DashMap<(Uuid, Uuid), OffsetDateTime>,
}

impl GroupService {
    pub fn new(store: Store, metrics: Arc<Collector>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            metrics,
            dispatcher,
            cooldowns: DashMap::new(),
        }
    }

    /// Recompute one group's snapshot and run alert-rule evaluation.
    /// Called from worker fan-out whenever a member produced a result.
    #[tracing::instrument(skip(self), fields(group_id = %group_id))]
    pub async fn refresh(&self, group_id: Uuid) -> Result<(), StoreError> {
        let Some(group) = self.store.group(group_id).await? else {
            return Ok(());
        };

        let members = self.store.group_members(group_id).await?;
        let now = OffsetDateTime::now_utc();

        let states = self.member_states(&members).await?;
        let snapshot = aggregate(&states);

        self.store
            .save_group_status(monitor_group_status::Model {
                group_id,
                overall_status: snapshot.overall_status,
                health_score: snapshot.health_score,
                monitors_up: snapshot.monitors_up,
                monitors_down: snapshot.monitors_down,
                monitors_degraded: snapshot.monitors_degraded,
                critical_monitors_down: snapshot.critical_monitors_down,
                last_check: now,
                message: snapshot.message.clone(),
            })
            .await?;

        self.metrics.record_group_snapshot(
            &group.tenant_id,
            &group_id.to_string(),
            &group.name,
            snapshot.health_score,
            snapshot.overall_status,
        );

        if members.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.evaluate_rules(&group, &states, &snapshot, now).await {
            warn!(group_id = %group_id, error = %e, "Group alert evaluation failed");
        }
        Ok(())
    }

    async fn member_states(
        &self,
        members: &[crate::entity::monitor_group_member::Model],
    ) -> Result<Vec<MemberState>, StoreError> {
        let ids: Vec<Uuid> = members.iter().map(|m| m.monitor_id).collect();
        let statuses = self.store.statuses_for(&ids).await?;
        let monitors = self.store.monitors(&ids).await?;
        Ok(members
            .iter()
            .map(|member| MemberState {
                monitor_id: member.monitor_id,
                name: monitors
                    .iter()
                    .find(|m| m.id == member.monitor_id)
                    .map(|m| m.name.clone())
                    .unwrap_or_default(),
                weight: member.weight,
                is_critical: member.is_critical,
                status: statuses
                    .iter()
                    .find(|s| s.monitor_id == member.monitor_id)
                    .map(|s| s.status),
            })
            .collect())
    }

    async fn evaluate_rules(
        &self,
        group: &monitor_group::Model,
        states: &[MemberState],
        snapshot: &Snapshot,
        now: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let rules = self.store.alert_rules(group.id).await?;
        let active = self.store.active_group_incident(group.id).await?;
        let triggered = first_matching(&rules, snapshot);

        match (triggered, active) {
            (Some(rule), None) => {
                let incident = self.open_incident(group, states, snapshot, now).await?;
                self.notify_rule(group, rule, snapshot, &incident, now).await?;
            }
            (Some(rule), Some(incident)) => {
                // Still firing: only re-notify once the cooldown expires.
                self.notify_rule(group, rule, snapshot, &incident, now).await?;
            }
            (None, Some(mut incident)) => {
                incident.resolved_at = Some(now);
                self.store.update_group_incident(incident.clone()).await?;
                info!(
                    incident_id = %incident.id,
                    group_id = %group.id,
                    "Resolved group incident"
                );
            }
            (None, None) => {}
        }
        Ok(())
    }

    async fn open_incident(
        &self,
        group: &monitor_group::Model,
        states: &[MemberState],
        snapshot: &Snapshot,
        now: OffsetDateTime,
    ) -> Result<monitor_group_incident::Model, StoreError> {
        let affected: Vec<Uuid> = states
            .iter()
            .filter(|s| {
                matches!(
                    s.effective_status(),
                    CheckStatus::Down | CheckStatus::Degraded
                )
            })
            .map(|s| s.monitor_id)
            .collect();
        let root_cause = states
            .iter()
            .find(|s| s.is_critical && s.effective_status() == CheckStatus::Down)
            .or_else(|| {
                states
                    .iter()
                    .find(|s| s.effective_status() == CheckStatus::Down)
            })
            .map(|s| s.monitor_id);

        let incident = monitor_group_incident::Model {
            id: Uuid::new_v4(),
            group_id: group.id,
            tenant_id: group.tenant_id.clone(),
            started_at: now,
            resolved_at: None,
            severity: incident_severity(snapshot),
            affected_monitors: UuidList(affected),
            root_cause_monitor_id: root_cause,
            notifications_sent: 0,
            health_score_at_start: Some(snapshot.health_score),
            acknowledged_at: None,
            acknowledged_by: None,
        };
        self.store.insert_group_incident(incident.clone()).await?;

        info!(
            incident_id = %incident.id,
            group_id = %group.id,
            health_score = snapshot.health_score,
            "Opened group incident"
        );
        Ok(incident)
    }

    /// Send notifications through the rule's channels (falling back to
    /// the group's), suppressed inside the rule's cooldown window.
    async fn notify_rule(
        &self,
        group: &monitor_group::Model,
        rule: &monitor_group_alert_rule::Model,
        snapshot: &Snapshot,
        incident: &monitor_group_incident::Model,
        now: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let key = (group.id, rule.id);
        if let Some(last) = self.cooldowns.get(&key) {
            let elapsed = now - *last;
            if elapsed < time::Duration::minutes(i64::from(rule.cooldown_minutes.max(0))) {
                return Ok(());
            }
        }

        let channels: &[NotificationChannel] = if rule.notification_channels.0.is_empty() {
            &group.notification_config.channels
        } else {
            &rule.notification_channels.0
        };
        if channels.is_empty() {
            return Ok(());
        }

        let notification = Notification {
            tenant_id: group.tenant_id.clone(),
            subject_id: group.id,
            subject_name: group.name.clone(),
            severity: incident.severity,
            message: format!(
                "{} (health score {:.1}, rule \"{}\")",
                snapshot.message, snapshot.health_score, rule.name
            ),
            recovered: false,
        };
        let delivered = self.dispatcher.send_all(channels, &notification).await;

        if delivered > 0 {
            self.cooldowns.insert(key, now);
            let mut updated = incident.clone();
            updated.notifications_sent += delivered as i32;
            self.store.update_group_incident(updated).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(weight: f64, is_critical: bool, status: Option<CheckStatus>) -> MemberState {
        MemberState {
            monitor_id: Uuid::new_v4(),
            name: "m".to_string(),
            weight,
            is_critical,
            status,
        }
    }

    #[test]
    fn weighted_score_and_overall_status() {
        let snapshot = aggregate(&[
            member(0.5, false, Some(CheckStatus::Up)),
            member(0.3, false, Some(CheckStatus::Degraded)),
            member(0.2, false, Some(CheckStatus::Down)),
        ]);
        assert!((snapshot.health_score - 65.0).abs() < 1e-9);
        assert_eq!(snapshot.overall_status, CheckStatus::Degraded);
        assert_eq!(snapshot.critical_monitors_down, 0);
        assert_eq!(snapshot.monitors_up, 1);
        assert_eq!(snapshot.monitors_down, 1);
        assert_eq!(snapshot.monitors_degraded, 1);
    }

    #[test]
    fn critical_member_down_drives_overall_down() {
        let snapshot = aggregate(&[
            member(0.5, false, Some(CheckStatus::Up)),
            member(0.3, false, Some(CheckStatus::Degraded)),
            member(0.2, true, Some(CheckStatus::Down)),
        ]);
        assert!((snapshot.health_score - 65.0).abs() < 1e-9);
        assert_eq!(snapshot.overall_status, CheckStatus::Down);
        assert_eq!(snapshot.critical_monitors_down, 1);
    }

    #[test]
    fn missing_status_counts_as_degraded() {
        let snapshot = aggregate(&[
            member(0.5, false, Some(CheckStatus::Up)),
            member(0.5, false, None),
        ]);
        assert_eq!(snapshot.monitors_degraded, 1);
        assert!((snapshot.health_score - 75.0).abs() < 1e-9);
        assert_eq!(snapshot.overall_status, CheckStatus::Degraded);
    }

    #[test]
    fn all_up_scores_hundred() {
        let snapshot = aggregate(&[
            member(0.6, true, Some(CheckStatus::Up)),
            member(0.4, false, Some(CheckStatus::Up)),
        ]);
        assert_eq!(snapshot.health_score, 100.0);
        assert_eq!(snapshot.overall_status, CheckStatus::Up);
        assert_eq!(snapshot.message, "All monitors operational");
    }

    #[test]
    fn all_down_scores_zero() {
        let snapshot = aggregate(&[
            member(0.5, false, Some(CheckStatus::Down)),
            member(0.5, false, Some(CheckStatus::Down)),
        ]);
        assert_eq!(snapshot.health_score, 0.0);
        assert_eq!(snapshot.monitors_down, 2);
    }

    #[test]
    fn critical_down_message_names_the_monitors() {
        let mut db_primary = member(0.4, true, Some(CheckStatus::Down));
        db_primary.name = "db-primary".to_string();
        let mut db_replica = member(0.3, true, Some(CheckStatus::Down));
        db_replica.name = "db-replica".to_string();
        let mut web = member(0.3, false, Some(CheckStatus::Up));
        web.name = "web".to_string();

        let snapshot = aggregate(&[db_primary, db_replica, web]);
        assert_eq!(
            snapshot.message,
            "Critical monitors down: db-primary, db-replica"
        );
    }

    #[test]
    fn critical_down_without_names_falls_back_to_plain_message() {
        let mut nameless = member(1.0, true, Some(CheckStatus::Down));
        nameless.name = String::new();
        let snapshot = aggregate(&[nameless]);
        assert_eq!(snapshot.message, "Critical monitors are down");
    }

    #[test]
    fn empty_group_snapshot() {
        let snapshot = aggregate(&[]);
        assert_eq!(snapshot.health_score, 0.0);
        assert_eq!(snapshot.overall_status, CheckStatus::Degraded);
        assert_eq!(snapshot.message, "No monitors in group");
    }

    #[test]
    fn counts_sum_to_member_count() {
        let members = [
            member(0.25, false, Some(CheckStatus::Up)),
            member(0.25, false, Some(CheckStatus::Down)),
            member(0.25, true, Some(CheckStatus::Down)),
            member(0.25, false, None),
        ];
        let snapshot = aggregate(&members);
        assert_eq!(
            snapshot.monitors_up + snapshot.monitors_down + snapshot.monitors_degraded,
            members.len() as i32
        );
        assert!(snapshot.critical_monitors_down <= snapshot.monitors_down);
    }
}
