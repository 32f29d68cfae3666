//! Result store adapter: the single mediation layer over the relational
//! store.
//!
//! Multi-row writes (result + status cache, group + members, incident
//! transitions) run in transactions. Reads used on the hot path are
//! backed by the indexes created in the migration crate.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entity::types::Severity;
use crate::entity::{
    check_result, incident, incident_event, monitor, monitor_group, monitor_group_alert_rule,
    monitor_group_incident, monitor_group_member, monitor_group_sla_report, monitor_group_slo,
    monitor_group_status, monitor_last_status, monitor_slo, sla_report,
};
use crate::error::StoreError;

/// Tolerance for the member-weight-sum invariant.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Filters for incident listings (external API pass-through).
#[derive(Debug, Default, Clone)]
pub struct IncidentFilters {
    pub tenant_id: Option<String>,
    pub monitor_id: Option<Uuid>,
    pub resolved: Option<bool>,
    pub severity: Option<Severity>,
    pub started_after: Option<OffsetDateTime>,
    pub started_before: Option<OffsetDateTime>,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // -----------------------------------------------------------------
    // Monitors
    // -----------------------------------------------------------------

    pub async fn insert_monitor(&self, model: monitor::Model) -> Result<(), StoreError> {
        monitor::ActiveModel::from(model).reset_all().insert(&self.db).await?;
        Ok(())
    }

    pub async fn monitor(&self, id: Uuid) -> Result<Option<monitor::Model>, StoreError> {
        Ok(monitor::Entity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn monitors(&self, ids: &[Uuid]) -> Result<Vec<monitor::Model>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(monitor::Entity::find()
            .filter(monitor::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?)
    }

    /// Deleting a monitor cascades to results, incidents, memberships and
    /// the status cache through the schema's foreign keys.
    pub async fn delete_monitor(&self, id: Uuid) -> Result<(), StoreError> {
        monitor::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    /// Enabled monitors whose interval has elapsed (or that have never
    /// been checked). The DB filters on the indexed `enabled` flag and
    /// joins the status cache; the per-monitor interval arithmetic is
    /// applied here to stay backend-portable.
    pub async fn due_monitors(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<monitor::Model>, StoreError> {
        let rows = monitor::Entity::find()
            .filter(monitor::Column::Enabled.eq(true))
            .find_also_related(monitor_last_status::Entity)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter(|(m, status)| match status {
                None => true,
                Some(s) => {
                    s.last_check + time::Duration::seconds(i64::from(m.interval_seconds)) < now
                }
            })
            .map(|(m, _)| m)
            .collect())
    }

    // -----------------------------------------------------------------
    // Check results + status cache
    // -----------------------------------------------------------------

    /// Persist a result and refresh the monitor's status cache in one
    /// transaction. The cache keeps whichever result carries the greatest
    /// `checked_at`, so late arrivals from slower regions never roll the
    /// cache backwards.
    #[tracing::instrument(skip(self, result), fields(monitor_id = %result.monitor_id))]
    pub async fn save_result(&self, result: check_result::Model) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;

        let monitor_id = result.monitor_id;
        let checked_at = result.checked_at;
        let status = result.status;
        let message = result.error.clone().unwrap_or_default();
        let response_time_ms = result.response_time_ms;
        let ssl_expiry_days = result
            .details
            .get("days_until_expiry")
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok());

        check_result::ActiveModel::from(result).reset_all().insert(&txn).await?;

        match monitor_last_status::Entity::find_by_id(monitor_id)
            .one(&txn)
            .await?
        {
            None => {
                monitor_last_status::ActiveModel {
                    monitor_id: ActiveValue::Set(monitor_id),
                    status: ActiveValue::Set(status),
                    message: ActiveValue::Set(message),
                    last_check: ActiveValue::Set(checked_at),
                    response_time_ms: ActiveValue::Set(response_time_ms),
                    ssl_expiry_days: ActiveValue::Set(ssl_expiry_days),
                }
                .insert(&txn)
                .await?;
            }
            Some(existing) if existing.last_check <= checked_at => {
                let mut active: monitor_last_status::ActiveModel = existing.into();
                active.status = ActiveValue::Set(status);
                active.message = ActiveValue::Set(message);
                active.last_check = ActiveValue::Set(checked_at);
                active.response_time_ms = ActiveValue::Set(response_time_ms);
                active.ssl_expiry_days = ActiveValue::Set(ssl_expiry_days);
                active.update(&txn).await?;
            }
            // Older than the cached result: keep the cache as is.
            Some(_) => {}
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn status_for(
        &self,
        monitor_id: Uuid,
    ) -> Result<Option<monitor_last_status::Model>, StoreError> {
        Ok(monitor_last_status::Entity::find_by_id(monitor_id)
            .one(&self.db)
            .await?)
    }

    pub async fn statuses_for(
        &self,
        monitor_ids: &[Uuid],
    ) -> Result<Vec<monitor_last_status::Model>, StoreError> {
        if monitor_ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(monitor_last_status::Entity::find()
            .filter(monitor_last_status::Column::MonitorId.is_in(monitor_ids.iter().copied()))
            .all(&self.db)
            .await?)
    }

    pub async fn history(
        &self,
        monitor_id: Uuid,
        limit: u64,
    ) -> Result<Vec<check_result::Model>, StoreError> {
        Ok(check_result::Entity::find()
            .filter(check_result::Column::MonitorId.eq(monitor_id))
            .order_by_desc(check_result::Column::CheckedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Results in `[start, end]`, ascending by check time (the order the
    /// SLA downtime-streak scan expects).
    pub async fn results_in(
        &self,
        monitor_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<check_result::Model>, StoreError> {
        Ok(check_result::Entity::find()
            .filter(check_result::Column::MonitorId.eq(monitor_id))
            .filter(check_result::Column::CheckedAt.gte(start))
            .filter(check_result::Column::CheckedAt.lte(end))
            .order_by_asc(check_result::Column::CheckedAt)
            .all(&self.db)
            .await?)
    }

    // -----------------------------------------------------------------
    // Incidents
    // -----------------------------------------------------------------

    pub async fn active_incident(
        &self,
        monitor_id: Uuid,
    ) -> Result<Option<incident::Model>, StoreError> {
        Ok(incident::Entity::find()
            .filter(incident::Column::MonitorId.eq(monitor_id))
            .filter(incident::Column::ResolvedAt.is_null())
            .order_by_desc(incident::Column::StartedAt)
            .one(&self.db)
            .await?)
    }

    pub async fn insert_incident(&self, model: incident::Model) -> Result<(), StoreError> {
        incident::ActiveModel::from(model).reset_all().insert(&self.db).await?;
        Ok(())
    }

    pub async fn update_incident(&self, model: incident::Model) -> Result<(), StoreError> {
        incident::ActiveModel::from(model)
            .reset_all()
            .update(&self.db)
            .await?;
        Ok(())
    }

    pub async fn incident(
        &self,
        id: Uuid,
        tenant_id: &str,
    ) -> Result<incident::Model, StoreError> {
        incident::Entity::find_by_id(id)
            .filter(incident::Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?
            .ok_or(StoreError::NotFound("incident"))
    }

    pub async fn incidents(
        &self,
        filters: &IncidentFilters,
    ) -> Result<Vec<incident::Model>, StoreError> {
        let mut query = incident::Entity::find();
        if let Some(tenant) = &filters.tenant_id {
            query = query.filter(incident::Column::TenantId.eq(tenant));
        }
        if let Some(monitor_id) = filters.monitor_id {
            query = query.filter(incident::Column::MonitorId.eq(monitor_id));
        }
        match filters.resolved {
            Some(true) => query = query.filter(incident::Column::ResolvedAt.is_not_null()),
            Some(false) => query = query.filter(incident::Column::ResolvedAt.is_null()),
            None => {}
        }
        if let Some(severity) = filters.severity {
            query = query.filter(incident::Column::Severity.eq(severity));
        }
        if let Some(after) = filters.started_after {
            query = query.filter(incident::Column::StartedAt.gte(after));
        }
        if let Some(before) = filters.started_before {
            query = query.filter(incident::Column::StartedAt.lte(before));
        }
        let limit = if filters.limit == 0 { 100 } else { filters.limit };
        Ok(query
            .order_by_desc(incident::Column::StartedAt)
            .limit(limit)
            .offset(filters.offset)
            .all(&self.db)
            .await?)
    }

    pub async fn open_incident_count(&self, monitor_id: Uuid) -> Result<u64, StoreError> {
        Ok(incident::Entity::find()
            .filter(incident::Column::MonitorId.eq(monitor_id))
            .filter(incident::Column::ResolvedAt.is_null())
            .count(&self.db)
            .await?)
    }

    pub async fn insert_incident_event(
        &self,
        model: incident_event::Model,
    ) -> Result<(), StoreError> {
        incident_event::ActiveModel::from(model)
            .reset_all()
            .insert(&self.db)
            .await?;
        Ok(())
    }

    pub async fn incident_events(
        &self,
        incident_id: Uuid,
    ) -> Result<Vec<incident_event::Model>, StoreError> {
        Ok(incident_event::Entity::find()
            .filter(incident_event::Column::IncidentId.eq(incident_id))
            .order_by_asc(incident_event::Column::EventTime)
            .all(&self.db)
            .await?)
    }

    // -----------------------------------------------------------------
    // SLOs
    // -----------------------------------------------------------------

    pub async fn monitor_slo(
        &self,
        monitor_id: Uuid,
    ) -> Result<Option<monitor_slo::Model>, StoreError> {
        Ok(monitor_slo::Entity::find()
            .filter(monitor_slo::Column::MonitorId.eq(monitor_id))
            .one(&self.db)
            .await?)
    }

    pub async fn upsert_monitor_slo(&self, model: monitor_slo::Model) -> Result<(), StoreError> {
        match monitor_slo::Entity::find()
            .filter(monitor_slo::Column::MonitorId.eq(model.monitor_id))
            .one(&self.db)
            .await?
        {
            Some(existing) => {
                let mut active: monitor_slo::ActiveModel = existing.into();
                active.target_uptime_percentage =
                    ActiveValue::Set(model.target_uptime_percentage);
                active.measurement_period_days = ActiveValue::Set(model.measurement_period_days);
                active.updated_at = ActiveValue::Set(OffsetDateTime::now_utc());
                active.update(&self.db).await?;
            }
            None => {
                monitor_slo::ActiveModel::from(model).reset_all().insert(&self.db).await?;
            }
        }
        Ok(())
    }

    pub async fn group_slo(
        &self,
        group_id: Uuid,
    ) -> Result<Option<monitor_group_slo::Model>, StoreError> {
        Ok(monitor_group_slo::Entity::find()
            .filter(monitor_group_slo::Column::GroupId.eq(group_id))
            .one(&self.db)
            .await?)
    }

    pub async fn upsert_group_slo(
        &self,
        model: monitor_group_slo::Model,
    ) -> Result<(), StoreError> {
        match monitor_group_slo::Entity::find()
            .filter(monitor_group_slo::Column::GroupId.eq(model.group_id))
            .one(&self.db)
            .await?
        {
            Some(existing) => {
                let mut active: monitor_group_slo::ActiveModel = existing.into();
                active.target_uptime_percentage =
                    ActiveValue::Set(model.target_uptime_percentage);
                active.measurement_period_days = ActiveValue::Set(model.measurement_period_days);
                active.calculation_method = ActiveValue::Set(model.calculation_method);
                active.updated_at = ActiveValue::Set(OffsetDateTime::now_utc());
                active.update(&self.db).await?;
            }
            None => {
                monitor_group_slo::ActiveModel::from(model)
                    .reset_all()
                    .insert(&self.db)
                    .await?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // SLA reports (idempotent per subject + period)
    // -----------------------------------------------------------------

    pub async fn upsert_sla_report(&self, model: sla_report::Model) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;
        sla_report::Entity::delete_many()
            .filter(sla_report::Column::MonitorId.eq(model.monitor_id))
            .filter(sla_report::Column::PeriodStart.eq(model.period_start))
            .filter(sla_report::Column::PeriodEnd.eq(model.period_end))
            .exec(&txn)
            .await?;
        sla_report::ActiveModel::from(model).reset_all().insert(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn sla_reports(
        &self,
        monitor_id: Uuid,
        limit: u64,
    ) -> Result<Vec<sla_report::Model>, StoreError> {
        Ok(sla_report::Entity::find()
            .filter(sla_report::Column::MonitorId.eq(monitor_id))
            .order_by_desc(sla_report::Column::PeriodStart)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn upsert_group_sla_report(
        &self,
        model: monitor_group_sla_report::Model,
    ) -> Result<(), StoreError> {
        let txn = self.db.begin().await?;
        monitor_group_sla_report::Entity::delete_many()
            .filter(monitor_group_sla_report::Column::GroupId.eq(model.group_id))
            .filter(monitor_group_sla_report::Column::PeriodStart.eq(model.period_start))
            .filter(monitor_group_sla_report::Column::PeriodEnd.eq(model.period_end))
            .exec(&txn)
            .await?;
        monitor_group_sla_report::ActiveModel::from(model)
            .reset_all()
            .insert(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn group_sla_reports(
        &self,
        group_id: Uuid,
        limit: u64,
    ) -> Result<Vec<monitor_group_sla_report::Model>, StoreError> {
        Ok(monitor_group_sla_report::Entity::find()
            .filter(monitor_group_sla_report::Column::GroupId.eq(group_id))
            .order_by_desc(monitor_group_sla_report::Column::PeriodStart)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    // -----------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------

    /// Create a group with its members atomically. Enforces the
    /// weight-sum invariant before anything is written.
    pub async fn create_group(
        &self,
        group: monitor_group::Model,
        members: Vec<monitor_group_member::Model>,
    ) -> Result<(), StoreError> {
        validate_weights(&members)?;

        let txn = self.db.begin().await?;
        monitor_group::ActiveModel::from(group).reset_all().insert(&txn).await?;
        for member in members {
            monitor_group_member::ActiveModel::from(member)
                .reset_all()
                .insert(&txn)
                .await?;
        }
        txn.commit().await?;
        Ok(())
    }

    pub async fn group(&self, id: Uuid) -> Result<Option<monitor_group::Model>, StoreError> {
        Ok(monitor_group::Entity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn delete_group(&self, id: Uuid) -> Result<(), StoreError> {
        monitor_group::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    /// Enabled groups containing the monitor; resolved at worker fan-out
    /// with a single join instead of back-pointers on the monitor.
    pub async fn groups_for_monitor(
        &self,
        monitor_id: Uuid,
    ) -> Result<Vec<monitor_group::Model>, StoreError> {
        Ok(monitor_group::Entity::find()
            .filter(monitor_group::Column::Enabled.eq(true))
            .inner_join(monitor_group_member::Entity)
            .filter(monitor_group_member::Column::MonitorId.eq(monitor_id))
            .all(&self.db)
            .await?)
    }

    pub async fn group_members(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<monitor_group_member::Model>, StoreError> {
        Ok(monitor_group_member::Entity::find()
            .filter(monitor_group_member::Column::GroupId.eq(group_id))
            .order_by_asc(monitor_group_member::Column::AddedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn alert_rules(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<monitor_group_alert_rule::Model>, StoreError> {
        Ok(monitor_group_alert_rule::Entity::find()
            .filter(monitor_group_alert_rule::Column::GroupId.eq(group_id))
            .order_by_asc(monitor_group_alert_rule::Column::Position)
            .all(&self.db)
            .await?)
    }

    pub async fn insert_alert_rule(
        &self,
        model: monitor_group_alert_rule::Model,
    ) -> Result<(), StoreError> {
        monitor_group_alert_rule::ActiveModel::from(model)
            .reset_all()
            .insert(&self.db)
            .await?;
        Ok(())
    }

    pub async fn save_group_status(
        &self,
        model: monitor_group_status::Model,
    ) -> Result<(), StoreError> {
        match monitor_group_status::Entity::find_by_id(model.group_id)
            .one(&self.db)
            .await?
        {
            Some(_) => {
                monitor_group_status::ActiveModel::from(model)
                    .reset_all()
                    .update(&self.db)
                    .await?;
            }
            None => {
                monitor_group_status::ActiveModel::from(model)
                    .reset_all()
                    .insert(&self.db)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn group_status(
        &self,
        group_id: Uuid,
    ) -> Result<Option<monitor_group_status::Model>, StoreError> {
        Ok(monitor_group_status::Entity::find_by_id(group_id)
            .one(&self.db)
            .await?)
    }

    pub async fn active_group_incident(
        &self,
        group_id: Uuid,
    ) -> Result<Option<monitor_group_incident::Model>, StoreError> {
        Ok(monitor_group_incident::Entity::find()
            .filter(monitor_group_incident::Column::GroupId.eq(group_id))
            .filter(monitor_group_incident::Column::ResolvedAt.is_null())
            .order_by_desc(monitor_group_incident::Column::StartedAt)
            .one(&self.db)
            .await?)
    }

    pub async fn insert_group_incident(
        &self,
        model: monitor_group_incident::Model,
    ) -> Result<(), StoreError> {
        monitor_group_incident::ActiveModel::from(model)
            .reset_all()
            .insert(&self.db)
            .await?;
        Ok(())
    }

    pub async fn update_group_incident(
        &self,
        model: monitor_group_incident::Model,
    ) -> Result<(), StoreError> {
        monitor_group_incident::ActiveModel::from(model)
            .reset_all()
            .update(&self.db)
            .await?;
        Ok(())
    }

    pub async fn group_incidents(
        &self,
        group_id: Uuid,
        limit: u64,
    ) -> Result<Vec<monitor_group_incident::Model>, StoreError> {
        Ok(monitor_group_incident::Entity::find()
            .filter(monitor_group_incident::Column::GroupId.eq(group_id))
            .order_by_desc(monitor_group_incident::Column::StartedAt)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn enabled_groups(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<monitor_group::Model>, StoreError> {
        Ok(monitor_group::Entity::find()
            .filter(monitor_group::Column::TenantId.eq(tenant_id))
            .filter(monitor_group::Column::Enabled.eq(true))
            .all(&self.db)
            .await?)
    }

    pub async fn all_monitor_slos(&self) -> Result<Vec<monitor_slo::Model>, StoreError> {
        Ok(monitor_slo::Entity::find().all(&self.db).await?)
    }

    pub async fn all_group_slos(&self) -> Result<Vec<monitor_group_slo::Model>, StoreError> {
        Ok(monitor_group_slo::Entity::find().all(&self.db).await?)
    }

    /// Touch a monitor's `updated_at` (used by the external API layer
    /// after config edits so in-flight jobs keep their snapshot).
    pub async fn touch_monitor(&self, id: Uuid) -> Result<(), StoreError> {
        monitor::Entity::update_many()
            .col_expr(
                monitor::Column::UpdatedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(monitor::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

pub(crate) fn validate_weights(
    members: &[monitor_group_member::Model],
) -> Result<(), StoreError> {
    if members.is_empty() {
        return Ok(());
    }
    let sum: f64 = members.iter().map(|m| m.weight).sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(StoreError::WeightSum(sum));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn member(weight: f64) -> monitor_group_member::Model {
        monitor_group_member::Model {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            monitor_id: Uuid::new_v4(),
            weight,
            is_critical: false,
            added_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn weight_sum_within_tolerance_passes() {
        assert!(validate_weights(&[member(0.5), member(0.3), member(0.2)]).is_ok());
        assert!(validate_weights(&[member(0.5), member(0.295), member(0.2)]).is_ok());
    }

    #[test]
    fn weight_sum_outside_tolerance_fails() {
        let err = validate_weights(&[member(0.5), member(0.3)]).unwrap_err();
        assert!(matches!(err, StoreError::WeightSum(_)));
    }

    #[test]
    fn empty_member_list_passes() {
        assert!(validate_weights(&[]).is_ok());
    }
}
