use sea_orm_migration::{prelude::*, schema::*};

use super::m20250818_000001_create_monitor_tables::Monitors;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Monitor SLO targets and the idempotent per-period SLA reports.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MonitorSlos::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorSlos::Id))
                    .col(uuid(MonitorSlos::MonitorId).not_null())
                    .col(string(MonitorSlos::TenantId).not_null())
                    .col(double(MonitorSlos::TargetUptimePercentage).not_null())
                    .col(integer(MonitorSlos::MeasurementPeriodDays).not_null())
                    .col(
                        timestamp_with_time_zone(MonitorSlos::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(MonitorSlos::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monitor_slos_monitor")
                            .from(MonitorSlos::Table, MonitorSlos::MonitorId)
                            .to(Monitors::Table, Monitors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monitor_slos_monitor_id")
                    .table(MonitorSlos::Table)
                    .col(MonitorSlos::MonitorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SlaReports::Table)
                    .if_not_exists()
                    .col(pk_uuid(SlaReports::Id))
                    .col(uuid(SlaReports::MonitorId).not_null())
                    .col(string(SlaReports::TenantId).not_null())
                    .col(timestamp_with_time_zone(SlaReports::PeriodStart).not_null())
                    .col(timestamp_with_time_zone(SlaReports::PeriodEnd).not_null())
                    .col(big_integer(SlaReports::TotalChecks).not_null())
                    .col(big_integer(SlaReports::SuccessfulChecks).not_null())
                    .col(big_integer(SlaReports::FailedChecks).not_null())
                    .col(double(SlaReports::UptimePercentage).not_null())
                    .col(big_integer(SlaReports::DowntimeMinutes).not_null())
                    .col(integer_null(SlaReports::AverageResponseTimeMs))
                    .col(boolean(SlaReports::SloMet).not_null())
                    .col(
                        timestamp_with_time_zone(SlaReports::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sla_reports_monitor")
                            .from(SlaReports::Table, SlaReports::MonitorId)
                            .to(Monitors::Table, Monitors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One report per subject and period; recomputation replaces it.
        manager
            .create_index(
                Index::create()
                    .name("uq_sla_reports_monitor_period")
                    .table(SlaReports::Table)
                    .col(SlaReports::MonitorId)
                    .col(SlaReports::PeriodStart)
                    .col(SlaReports::PeriodEnd)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SlaReports::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MonitorSlos::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum MonitorSlos {
    Table,
    Id,
    MonitorId,
    TenantId,
    TargetUptimePercentage,
    MeasurementPeriodDays,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum SlaReports {
    Table,
    Id,
    MonitorId,
    TenantId,
    PeriodStart,
    PeriodEnd,
    TotalChecks,
    SuccessfulChecks,
    FailedChecks,
    UptimePercentage,
    DowntimeMinutes,
    AverageResponseTimeMs,
    SloMet,
    CreatedAt,
}
