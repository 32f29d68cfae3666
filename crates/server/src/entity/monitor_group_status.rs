use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use super::types::CheckStatus;

/// Cached group aggregate, rewritten on every member result.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitor_group_status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: Uuid,
    pub overall_status: CheckStatus,
    pub health_score: f64,
    pub monitors_up: i32,
    pub monitors_down: i32,
    pub monitors_degraded: i32,
    pub critical_monitors_down: i32,
    pub last_check: OffsetDateTime,
    pub message: String,
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
