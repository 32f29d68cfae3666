//! Core probing and aggregation engine of a multi-tenant uptime
//! monitoring service.
//!
//! Declarative monitors (HTTP endpoints, TLS certificates, DNS records,
//! domain registrations) are probed on a recurring schedule from one or
//! more regions. Each outcome is persisted, drives a per-monitor incident
//! state machine, rolls up into weighted group health, and feeds SLA
//! reporting plus a Prometheus metric surface with per-tenant remote
//! write.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::metrics::Collector;
use crate::store::Store;

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod groups;
pub mod incidents;
pub mod metrics;
pub mod notify;
pub mod probes;
pub mod scheduler;
pub mod sla;
pub mod store;

/// Shared handles threaded through every long-lived task.
#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub metrics: Arc<Collector>,
}

impl AppResources {
    pub fn store(&self) -> Store {
        Store::new(self.db.as_ref().clone())
    }
}
