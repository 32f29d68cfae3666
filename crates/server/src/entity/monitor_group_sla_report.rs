use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

/// Group-period compliance record, unique on
/// `(group_id, period_start, period_end)`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitor_group_sla_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: String,
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub health_score_average: f64,
    pub uptime_percentage: f64,
    pub downtime_minutes: i64,
    pub incidents_count: i32,
    pub slo_met: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::monitor_group::Entity",
        from = "Column::GroupId",
        to = "super::monitor_group::Column::Id",
        on_delete = "Cascade"
    )]
    Group,
}

impl Related<super::monitor_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
