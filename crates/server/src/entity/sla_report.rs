use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

/// Computed compliance record for one monitor and period. Unique on
/// `(monitor_id, period_start, period_end)`; recomputation replaces the
/// existing row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "sla_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub monitor_id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: String,
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub total_checks: i64,
    pub successful_checks: i64,
    pub failed_checks: i64,
    pub uptime_percentage: f64,
    pub downtime_minutes: i64,
    pub average_response_time_ms: Option<i32>,
    pub slo_met: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::monitor::Entity",
        from = "Column::MonitorId",
        to = "super::monitor::Column::Id",
        on_delete = "Cascade"
    )]
    Monitor,
}

impl Related<super::monitor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Monitor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
