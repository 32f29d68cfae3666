use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Base tables: monitor definitions, probe results and the last-status
/// cache the scheduler joins against.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Monitors::Table)
                    .if_not_exists()
                    .col(pk_uuid(Monitors::Id))
                    .col(string(Monitors::TenantId).not_null())
                    .col(string(Monitors::Name).not_null())
                    .col(string(Monitors::Kind).not_null())
                    .col(string(Monitors::Target).not_null())
                    .col(boolean(Monitors::Enabled).not_null().default(true))
                    .col(integer(Monitors::IntervalSeconds).not_null())
                    .col(integer(Monitors::TimeoutSeconds).not_null())
                    .col(json_binary(Monitors::Regions).not_null())
                    .col(json_binary(Monitors::Config).not_null())
                    .col(json_binary(Monitors::NotificationConfig).not_null())
                    .col(json_binary(Monitors::Tags).not_null())
                    .col(
                        timestamp_with_time_zone(Monitors::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Monitors::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monitors_tenant_id")
                    .table(Monitors::Table)
                    .col(Monitors::TenantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monitors_enabled")
                    .table(Monitors::Table)
                    .col(Monitors::Enabled)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CheckResults::Table)
                    .if_not_exists()
                    .col(pk_uuid(CheckResults::Id))
                    .col(uuid(CheckResults::MonitorId).not_null())
                    .col(string(CheckResults::TenantId).not_null())
                    .col(string(CheckResults::Status).not_null())
                    .col(integer(CheckResults::ResponseTimeMs).not_null().default(0))
                    .col(integer_null(CheckResults::StatusCode))
                    .col(text_null(CheckResults::Error))
                    .col(json_binary(CheckResults::Details).not_null())
                    .col(string(CheckResults::Region).not_null())
                    .col(timestamp_with_time_zone(CheckResults::CheckedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_check_results_monitor")
                            .from(CheckResults::Table, CheckResults::MonitorId)
                            .to(Monitors::Table, Monitors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_check_results_monitor_checked_at")
                    .table(CheckResults::Table)
                    .col(CheckResults::MonitorId)
                    .col(CheckResults::CheckedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonitorLastStatus::Table)
                    .if_not_exists()
                    .col(pk_uuid(MonitorLastStatus::MonitorId))
                    .col(string(MonitorLastStatus::Status).not_null())
                    .col(string(MonitorLastStatus::Message).not_null().default(""))
                    .col(timestamp_with_time_zone(MonitorLastStatus::LastCheck).not_null())
                    .col(
                        integer(MonitorLastStatus::ResponseTimeMs)
                            .not_null()
                            .default(0),
                    )
                    .col(integer_null(MonitorLastStatus::SslExpiryDays))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monitor_last_status_monitor")
                            .from(MonitorLastStatus::Table, MonitorLastStatus::MonitorId)
                            .to(Monitors::Table, Monitors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The due-monitor query runs every scheduler tick.
        manager
            .create_index(
                Index::create()
                    .name("idx_monitor_last_status_last_check")
                    .table(MonitorLastStatus::Table)
                    .col(MonitorLastStatus::LastCheck)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MonitorLastStatus::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CheckResults::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Monitors::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Monitors {
    Table,
    Id,
    TenantId,
    Name,
    Kind,
    Target,
    Enabled,
    IntervalSeconds,
    TimeoutSeconds,
    Regions,
    Config,
    NotificationConfig,
    Tags,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum CheckResults {
    Table,
    Id,
    MonitorId,
    TenantId,
    Status,
    ResponseTimeMs,
    StatusCode,
    Error,
    Details,
    Region,
    CheckedAt,
}

#[derive(Iden)]
pub enum MonitorLastStatus {
    Table,
    MonitorId,
    Status,
    Message,
    LastCheck,
    ResponseTimeMs,
    SslExpiryDays,
}
