//! SeaORM entities for the engine's persisted model.
//!
//! One module per table; shared column value types (status enums, JSON
//! payload types) live in [`types`].

pub mod check_result;
pub mod incident;
pub mod incident_event;
pub mod monitor;
pub mod monitor_group;
pub mod monitor_group_alert_rule;
pub mod monitor_group_incident;
pub mod monitor_group_member;
pub mod monitor_group_sla_report;
pub mod monitor_group_slo;
pub mod monitor_group_status;
pub mod monitor_last_status;
pub mod monitor_slo;
pub mod sla_report;
pub mod types;
