//! Shared fixtures for the integration test suite: an in-memory sqlite
//! store with the full schema applied, plus model factories.
#![allow(dead_code)]

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use time::OffsetDateTime;
use uuid::Uuid;

use uptime_sentinel::entity::types::{
    CheckStatus, MonitorKind, NotificationConfig, ProbeConfig, StringList,
};
use uptime_sentinel::entity::{check_result, monitor, monitor_group, monitor_group_member};

/// Fresh in-memory database with all migrations applied. A single
/// connection keeps sqlite's per-connection `:memory:` semantics sane.
pub async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options)
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("apply migrations");
    db
}

pub fn monitor(kind: MonitorKind, interval_seconds: i32) -> monitor::Model {
    monitor::Model {
        id: Uuid::new_v4(),
        tenant_id: "tenant-1".to_string(),
        name: "checkout-api".to_string(),
        kind,
        target: "https://example.org/health".to_string(),
        enabled: true,
        interval_seconds,
        timeout_seconds: 10,
        regions: StringList(vec!["us-east".to_string()]),
        config: ProbeConfig::default(),
        notification_config: NotificationConfig::default(),
        tags: serde_json::json!({}),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn check(
    monitor: &monitor::Model,
    status: CheckStatus,
    checked_at: OffsetDateTime,
) -> check_result::Model {
    check_result::Model {
        id: Uuid::new_v4(),
        monitor_id: monitor.id,
        tenant_id: monitor.tenant_id.clone(),
        status,
        response_time_ms: 120,
        status_code: None,
        error: match status {
            CheckStatus::Up => None,
            _ => Some("Unexpected status code: 500".to_string()),
        },
        details: serde_json::json!({}),
        region: "us-east".to_string(),
        checked_at,
    }
}

pub fn group(tenant_id: &str) -> monitor_group::Model {
    monitor_group::Model {
        id: Uuid::new_v4(),
        tenant_id: tenant_id.to_string(),
        name: "storefront".to_string(),
        description: String::new(),
        enabled: true,
        notification_config: NotificationConfig::default(),
        tags: serde_json::json!({}),
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn member(
    group: &monitor_group::Model,
    monitor: &monitor::Model,
    weight: f64,
    is_critical: bool,
) -> monitor_group_member::Model {
    monitor_group_member::Model {
        id: Uuid::new_v4(),
        group_id: group.id,
        monitor_id: monitor.id,
        weight,
        is_critical,
        added_at: OffsetDateTime::UNIX_EPOCH,
    }
}
