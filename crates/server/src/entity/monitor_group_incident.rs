use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use super::types::{Severity, UuidList};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitor_group_incidents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: String,
    pub started_at: OffsetDateTime,
    pub resolved_at: Option<OffsetDateTime>,
    pub severity: Severity,
    pub affected_monitors: UuidList,
    pub root_cause_monitor_id: Option<Uuid>,
    pub notifications_sent: i32,
    pub health_score_at_start: Option<f64>,
    pub acknowledged_at: Option<OffsetDateTime>,
    pub acknowledged_by: Option<String>,
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
