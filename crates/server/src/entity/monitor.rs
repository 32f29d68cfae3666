use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use super::types::{MonitorKind, NotificationConfig, ProbeConfig, StringList};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: String,
    pub name: String,
    pub kind: MonitorKind,
    pub target: String,
    pub enabled: bool,
    /// Seconds between probes (>= 30).
    pub interval_seconds: i32,
    /// Wall-clock probe deadline in seconds (1..=60).
    pub timeout_seconds: i32,
    pub regions: StringList,
    pub config: ProbeConfig,
    pub notification_config: NotificationConfig,
    pub tags: Json,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::check_result::Entity")]
    CheckResult,
    #[sea_orm(has_many = "super::incident::Entity")]
    Incident,
    #[sea_orm(has_many = "super::monitor_group_member::Entity")]
    GroupMember,
}

impl Related<super::check_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckResult.def()
    }
}

impl Related<super::incident::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Incident.def()
    }
}

impl Related<super::monitor_group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupMember.def()
    }
}

impl Related<super::monitor_last_status::Entity> for Entity {
    fn to() -> RelationDef {
        super::monitor_last_status::Relation::Monitor.def().rev()
    }
}

impl ActiveModelBehavior for ActiveModel {}
