//! Column value types shared across entities.
//!
//! Status and severity enums are stored as strings; structured config
//! blobs are stored as JSON and deserialized through
//! [`FromJsonQueryResult`].

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of probe a monitor runs. The wire names (`http`, `ssl`, `dns`,
/// `domain`) match the external monitor JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum MonitorKind {
    #[sea_orm(string_value = "http")]
    Http,
    #[sea_orm(string_value = "ssl")]
    Ssl,
    #[sea_orm(string_value = "dns")]
    Dns,
    #[sea_orm(string_value = "domain")]
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    #[sea_orm(string_value = "up")]
    Up,
    #[sea_orm(string_value = "down")]
    Down,
    #[sea_orm(string_value = "degraded")]
    Degraded,
}

impl CheckStatus {
    /// Score contribution of a member with this status (up = 100,
    /// degraded = 50, down = 0).
    pub fn health_points(self) -> f64 {
        match self {
            CheckStatus::Up => 100.0,
            CheckStatus::Degraded => 50.0,
            CheckStatus::Down => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[sea_orm(string_value = "critical")]
    Critical,
    #[sea_orm(string_value = "warning")]
    Warning,
    #[sea_orm(string_value = "info")]
    Info,
}

/// Incident timeline entry kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum IncidentEventKind {
    #[sea_orm(string_value = "detected")]
    Detected,
    #[sea_orm(string_value = "acknowledged")]
    Acknowledged,
    #[sea_orm(string_value = "investigating")]
    Investigating,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "comment")]
    Comment,
}

/// Group alert trigger conditions, evaluated in declared rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    #[sea_orm(string_value = "health_score_below")]
    HealthScoreBelow,
    #[sea_orm(string_value = "any_critical_down")]
    AnyCriticalDown,
    #[sea_orm(string_value = "percentage_down")]
    PercentageDown,
    #[sea_orm(string_value = "all_down")]
    AllDown,
}

/// How a group SLO composes member uptimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    #[sea_orm(string_value = "weighted_average")]
    WeightedAverage,
    #[sea_orm(string_value = "worst_case")]
    WorstCase,
    #[sea_orm(string_value = "critical_only")]
    CriticalOnly,
}

/// JSON-encoded list of strings (regions, expected DNS values, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

/// JSON-encoded list of monitor ids (group incident blast radius).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct UuidList(pub Vec<Uuid>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Kind-specific probe options, stored as one JSON blob on the monitor.
/// Unknown fields are preserved-by-ignore so older rows keep loading.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(default)]
pub struct ProbeConfig {
    // HTTP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expected_status_codes: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,

    // TLS
    pub check_expiry: bool,
    pub min_days_before_expiry: i64,

    // DNS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expected_values: Vec<String>,

    // Domain registration
    pub domain_min_days_before_expiry: i64,
}

/// One notification sink. Transport is external; the engine only records
/// delivery outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub kind: String,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Per-monitor (or per-group) notification policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(default)]
pub struct NotificationConfig {
    pub channels: Vec<NotificationChannel>,
    /// Open-incident check count at which the first notification fires.
    pub on_failure_count: i32,
    pub on_recovery: bool,
    /// Re-notify every N affected checks while the incident stays open
    /// (0 disables reminders).
    pub reminder_interval: i32,
}

/// JSON-encoded channel list (alert rules carry their own sinks).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ChannelList(pub Vec<NotificationChannel>);
