use sea_orm_migration::{prelude::*, schema::*};

use super::m20250818_000001_create_monitor_tables::Monitors;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Monitor groups: weighted memberships, cached aggregate status, group
/// SLOs, alert rules, group incidents and group SLA reports.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MonitorGroups::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorGroups::Id))
                    .col(string(MonitorGroups::TenantId).not_null())
                    .col(string(MonitorGroups::Name).not_null())
                    .col(text(MonitorGroups::Description).not_null().default(""))
                    .col(boolean(MonitorGroups::Enabled).not_null().default(true))
                    .col(json_binary(MonitorGroups::NotificationConfig).not_null())
                    .col(json_binary(MonitorGroups::Tags).not_null())
                    .col(
                        timestamp_with_time_zone(MonitorGroups::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(MonitorGroups::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monitor_groups_tenant_id")
                    .table(MonitorGroups::Table)
                    .col(MonitorGroups::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonitorGroupMembers::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorGroupMembers::Id))
                    .col(uuid(MonitorGroupMembers::GroupId).not_null())
                    .col(uuid(MonitorGroupMembers::MonitorId).not_null())
                    .col(double(MonitorGroupMembers::Weight).not_null())
                    .col(
                        boolean(MonitorGroupMembers::IsCritical)
                            .not_null()
                            .default(false),
                    )
                    .col(
                        timestamp_with_time_zone(MonitorGroupMembers::AddedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_members_group")
                            .from(MonitorGroupMembers::Table, MonitorGroupMembers::GroupId)
                            .to(MonitorGroups::Table, MonitorGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_members_monitor")
                            .from(MonitorGroupMembers::Table, MonitorGroupMembers::MonitorId)
                            .to(Monitors::Table, Monitors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_group_members_group_monitor")
                    .table(MonitorGroupMembers::Table)
                    .col(MonitorGroupMembers::GroupId)
                    .col(MonitorGroupMembers::MonitorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Worker fan-out resolves memberships by monitor id.
        manager
            .create_index(
                Index::create()
                    .name("idx_group_members_monitor_id")
                    .table(MonitorGroupMembers::Table)
                    .col(MonitorGroupMembers::MonitorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonitorGroupStatus::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorGroupStatus::GroupId))
                    .col(string(MonitorGroupStatus::OverallStatus).not_null())
                    .col(double(MonitorGroupStatus::HealthScore).not_null())
                    .col(integer(MonitorGroupStatus::MonitorsUp).not_null().default(0))
                    .col(
                        integer(MonitorGroupStatus::MonitorsDown)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        integer(MonitorGroupStatus::MonitorsDegraded)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        integer(MonitorGroupStatus::CriticalMonitorsDown)
                            .not_null()
                            .default(0),
                    )
                    .col(timestamp_with_time_zone(MonitorGroupStatus::LastCheck).not_null())
                    .col(string(MonitorGroupStatus::Message).not_null().default(""))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_status_group")
                            .from(MonitorGroupStatus::Table, MonitorGroupStatus::GroupId)
                            .to(MonitorGroups::Table, MonitorGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonitorGroupSlos::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorGroupSlos::Id))
                    .col(uuid(MonitorGroupSlos::GroupId).not_null())
                    .col(string(MonitorGroupSlos::TenantId).not_null())
                    .col(double(MonitorGroupSlos::TargetUptimePercentage).not_null())
                    .col(integer(MonitorGroupSlos::MeasurementPeriodDays).not_null())
                    .col(string(MonitorGroupSlos::CalculationMethod).not_null())
                    .col(
                        timestamp_with_time_zone(MonitorGroupSlos::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(MonitorGroupSlos::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_slos_group")
                            .from(MonitorGroupSlos::Table, MonitorGroupSlos::GroupId)
                            .to(MonitorGroups::Table, MonitorGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_group_slos_group_id")
                    .table(MonitorGroupSlos::Table)
                    .col(MonitorGroupSlos::GroupId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonitorGroupAlertRules::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorGroupAlertRules::Id))
                    .col(uuid(MonitorGroupAlertRules::GroupId).not_null())
                    .col(string(MonitorGroupAlertRules::Name).not_null())
                    .col(
                        boolean(MonitorGroupAlertRules::Enabled)
                            .not_null()
                            .default(true),
                    )
                    .col(string(MonitorGroupAlertRules::TriggerCondition).not_null())
                    .col(double_null(MonitorGroupAlertRules::ThresholdValue))
                    .col(json_binary(MonitorGroupAlertRules::NotificationChannels).not_null())
                    .col(
                        integer(MonitorGroupAlertRules::CooldownMinutes)
                            .not_null()
                            .default(0),
                    )
                    .col(integer(MonitorGroupAlertRules::Position).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(MonitorGroupAlertRules::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(MonitorGroupAlertRules::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_alert_rules_group")
                            .from(
                                MonitorGroupAlertRules::Table,
                                MonitorGroupAlertRules::GroupId,
                            )
                            .to(MonitorGroups::Table, MonitorGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_alert_rules_group_position")
                    .table(MonitorGroupAlertRules::Table)
                    .col(MonitorGroupAlertRules::GroupId)
                    .col(MonitorGroupAlertRules::Position)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonitorGroupIncidents::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorGroupIncidents::Id))
                    .col(uuid(MonitorGroupIncidents::GroupId).not_null())
                    .col(string(MonitorGroupIncidents::TenantId).not_null())
                    .col(timestamp_with_time_zone(MonitorGroupIncidents::StartedAt).not_null())
                    .col(timestamp_with_time_zone_null(
                        MonitorGroupIncidents::ResolvedAt,
                    ))
                    .col(string(MonitorGroupIncidents::Severity).not_null())
                    .col(json_binary(MonitorGroupIncidents::AffectedMonitors).not_null())
                    .col(uuid_null(MonitorGroupIncidents::RootCauseMonitorId))
                    .col(
                        integer(MonitorGroupIncidents::NotificationsSent)
                            .not_null()
                            .default(0),
                    )
                    .col(double_null(MonitorGroupIncidents::HealthScoreAtStart))
                    .col(timestamp_with_time_zone_null(
                        MonitorGroupIncidents::AcknowledgedAt,
                    ))
                    .col(string_null(MonitorGroupIncidents::AcknowledgedBy))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_incidents_group")
                            .from(MonitorGroupIncidents::Table, MonitorGroupIncidents::GroupId)
                            .to(MonitorGroups::Table, MonitorGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_incidents_group_resolved")
                    .table(MonitorGroupIncidents::Table)
                    .col(MonitorGroupIncidents::GroupId)
                    .col(MonitorGroupIncidents::ResolvedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonitorGroupSlaReports::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorGroupSlaReports::Id))
                    .col(uuid(MonitorGroupSlaReports::GroupId).not_null())
                    .col(string(MonitorGroupSlaReports::TenantId).not_null())
                    .col(timestamp_with_time_zone(MonitorGroupSlaReports::PeriodStart).not_null())
                    .col(timestamp_with_time_zone(MonitorGroupSlaReports::PeriodEnd).not_null())
                    .col(double(MonitorGroupSlaReports::HealthScoreAverage).not_null())
                    .col(double(MonitorGroupSlaReports::UptimePercentage).not_null())
                    .col(big_integer(MonitorGroupSlaReports::DowntimeMinutes).not_null())
                    .col(
                        integer(MonitorGroupSlaReports::IncidentsCount)
                            .not_null()
                            .default(0),
                    )
                    .col(boolean(MonitorGroupSlaReports::SloMet).not_null())
                    .col(
                        timestamp_with_time_zone(MonitorGroupSlaReports::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_sla_reports_group")
                            .from(
                                MonitorGroupSlaReports::Table,
                                MonitorGroupSlaReports::GroupId,
                            )
                            .to(MonitorGroups::Table, MonitorGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_group_sla_reports_group_period")
                    .table(MonitorGroupSlaReports::Table)
                    .col(MonitorGroupSlaReports::GroupId)
                    .col(MonitorGroupSlaReports::PeriodStart)
                    .col(MonitorGroupSlaReports::PeriodEnd)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Table::drop().table(MonitorGroupSlaReports::Table).to_owned(),
            Table::drop().table(MonitorGroupIncidents::Table).to_owned(),
            Table::drop().table(MonitorGroupAlertRules::Table).to_owned(),
            Table::drop().table(MonitorGroupSlos::Table).to_owned(),
            Table::drop().table(MonitorGroupStatus::Table).to_owned(),
            Table::drop().table(MonitorGroupMembers::Table).to_owned(),
            Table::drop().table(MonitorGroups::Table).to_owned(),
        ] {
            manager.drop_table(table).await?;
        }
        Ok(())
    }
}

#[derive(Iden)]
pub enum MonitorGroups {
    Table,
    Id,
    TenantId,
    Name,
    Description,
    Enabled,
    NotificationConfig,
    Tags,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum MonitorGroupMembers {
    Table,
    Id,
    GroupId,
    MonitorId,
    Weight,
    IsCritical,
    AddedAt,
}

#[derive(Iden)]
pub enum MonitorGroupStatus {
    Table,
    GroupId,
    OverallStatus,
    HealthScore,
    MonitorsUp,
    MonitorsDown,
    MonitorsDegraded,
    CriticalMonitorsDown,
    LastCheck,
    Message,
}

#[derive(Iden)]
pub enum MonitorGroupSlos {
    Table,
    Id,
    GroupId,
    TenantId,
    TargetUptimePercentage,
    MeasurementPeriodDays,
    CalculationMethod,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum MonitorGroupAlertRules {
    Table,
    Id,
    GroupId,
    Name,
    Enabled,
    TriggerCondition,
    ThresholdValue,
    NotificationChannels,
    CooldownMinutes,
    Position,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum MonitorGroupIncidents {
    Table,
    Id,
    GroupId,
    TenantId,
    StartedAt,
    ResolvedAt,
    Severity,
    AffectedMonitors,
    RootCauseMonitorId,
    NotificationsSent,
    HealthScoreAtStart,
    AcknowledgedAt,
    AcknowledgedBy,
}

#[derive(Iden)]
pub enum MonitorGroupSlaReports {
    Table,
    Id,
    GroupId,
    TenantId,
    PeriodStart,
    PeriodEnd,
    HealthScoreAverage,
    UptimePercentage,
    DowntimeMinutes,
    IncidentsCount,
    SloMet,
    CreatedAt,
}
