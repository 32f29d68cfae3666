use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use super::types::{ChannelList, TriggerCondition};

/// Group-scoped alert rule. Rules evaluate in ascending `position`
/// order; the first match wins.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitor_group_alert_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub enabled: bool,
    pub trigger_condition: TriggerCondition,
    pub threshold_value: Option<f64>,
    pub notification_channels: ChannelList,
    pub cooldown_minutes: i32,
    pub position: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
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
