use sea_orm_migration::{prelude::*, schema::*};

use super::m20250818_000001_create_monitor_tables::Monitors;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Per-monitor incidents and their timeline events.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Incidents::Table)
                    .if_not_exists()
                    .col(pk_uuid(Incidents::Id))
                    .col(uuid(Incidents::MonitorId).not_null())
                    .col(string(Incidents::TenantId).not_null())
                    .col(timestamp_with_time_zone(Incidents::StartedAt).not_null())
                    .col(timestamp_with_time_zone_null(Incidents::ResolvedAt))
                    .col(string(Incidents::Severity).not_null())
                    .col(big_integer(Incidents::DowntimeMinutes).not_null().default(0))
                    .col(integer(Incidents::AffectedChecks).not_null().default(0))
                    .col(integer(Incidents::NotificationsSent).not_null().default(0))
                    .col(timestamp_with_time_zone_null(Incidents::AcknowledgedAt))
                    .col(string_null(Incidents::AcknowledgedBy))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_incidents_monitor")
                            .from(Incidents::Table, Incidents::MonitorId)
                            .to(Monitors::Table, Monitors::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Open-incident lookup happens on every non-up result.
        manager
            .create_index(
                Index::create()
                    .name("idx_incidents_monitor_resolved")
                    .table(Incidents::Table)
                    .col(Incidents::MonitorId)
                    .col(Incidents::ResolvedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_incidents_started_at")
                    .table(Incidents::Table)
                    .col(Incidents::StartedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IncidentEvents::Table)
                    .if_not_exists()
                    .col(pk_uuid(IncidentEvents::Id))
                    .col(uuid(IncidentEvents::IncidentId).not_null())
                    .col(string(IncidentEvents::Kind).not_null())
                    .col(timestamp_with_time_zone(IncidentEvents::EventTime).not_null())
                    .col(text(IncidentEvents::Description).not_null())
                    .col(string_null(IncidentEvents::CreatedBy))
                    .col(json_binary(IncidentEvents::Metadata).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_incident_events_incident")
                            .from(IncidentEvents::Table, IncidentEvents::IncidentId)
                            .to(Incidents::Table, Incidents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_incident_events_incident_id")
                    .table(IncidentEvents::Table)
                    .col(IncidentEvents::IncidentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IncidentEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Incidents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Incidents {
    Table,
    Id,
    MonitorId,
    TenantId,
    StartedAt,
    ResolvedAt,
    Severity,
    DowntimeMinutes,
    AffectedChecks,
    NotificationsSent,
    AcknowledgedAt,
    AcknowledgedBy,
}

#[derive(Iden)]
pub enum IncidentEvents {
    Table,
    Id,
    IncidentId,
    Kind,
    EventTime,
    Description,
    CreatedBy,
    Metadata,
}
