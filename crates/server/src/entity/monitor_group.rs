use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use super::types::NotificationConfig;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitor_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub notification_config: NotificationConfig,
    pub tags: Json,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monitor_group_member::Entity")]
    Member,
    #[sea_orm(has_many = "super::monitor_group_alert_rule::Entity")]
    AlertRule,
    #[sea_orm(has_many = "super::monitor_group_incident::Entity")]
    Incident,
}

impl Related<super::monitor_group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl Related<super::monitor_group_alert_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertRule.def()
    }
}

impl Related<super::monitor_group_incident::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Incident.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
