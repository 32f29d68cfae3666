use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use super::types::CheckStatus;

/// Cache row mirroring the most recent [`super::check_result`] per
/// monitor; updated in the same transaction as the result insert.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitor_last_status")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub monitor_id: Uuid,
    pub status: CheckStatus,
    pub message: String,
    pub last_check: OffsetDateTime,
    pub response_time_ms: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_expiry_days: Option<i32>,
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
