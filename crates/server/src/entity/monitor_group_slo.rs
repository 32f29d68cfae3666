use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use super::types::CalculationMethod;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "monitor_group_slos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    #[serde(skip_serializing)]
    pub tenant_id: String,
    pub target_uptime_percentage: f64,
    pub measurement_period_days: i32,
    pub calculation_method: CalculationMethod,
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
