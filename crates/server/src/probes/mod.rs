//! Probe executors: one stateless function per monitor kind, each
//! mapping `(monitor, region)` to a check outcome.
//!
//! Executors never mutate shared state. Each honors the monitor timeout
//! internally; the worker additionally wraps the call in a hard deadline
//! and synthesizes a timeout outcome if an executor overruns.

pub mod dns;
pub mod http;
pub mod tls;
pub mod whois;

use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::Resolver;
use hickory_resolver::name_server::ConnectionProvider;
use serde_json::{Map, Value};

use crate::entity::monitor;
use crate::entity::types::{CheckStatus, MonitorKind};
use crate::error::ProbeFailure;

/// Outcome of a single probe execution, before the worker stamps an id
/// and timestamp onto it.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: CheckStatus,
    pub response_time_ms: i32,
    pub status_code: Option<i32>,
    pub error: Option<String>,
    pub details: Map<String, Value>,
}

impl ProbeOutcome {
    pub fn up(elapsed: Duration) -> Self {
        Self {
            status: CheckStatus::Up,
            response_time_ms: elapsed_ms(elapsed),
            status_code: None,
            error: None,
            details: Map::new(),
        }
    }

    pub fn failed(failure: &ProbeFailure, elapsed: Duration) -> Self {
        let status = if failure.is_degradation() {
            CheckStatus::Degraded
        } else {
            CheckStatus::Down
        };
        Self {
            status,
            response_time_ms: elapsed_ms(elapsed),
            status_code: None,
            error: Some(failure.to_string()),
            details: Map::new(),
        }
    }

    pub fn degraded(error: String, elapsed: Duration) -> Self {
        Self {
            status: CheckStatus::Degraded,
            response_time_ms: elapsed_ms(elapsed),
            status_code: None,
            error: Some(error),
            details: Map::new(),
        }
    }

    /// Synthesized by the worker when the hard deadline expires.
    pub fn timed_out(deadline: Duration) -> Self {
        Self::failed(&ProbeFailure::Timeout(deadline), deadline)
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

pub(crate) fn elapsed_ms(elapsed: Duration) -> i32 {
    i32::try_from(elapsed.as_millis()).unwrap_or(i32::MAX)
}

/// Effective probe deadline: the monitor's own timeout clamped into
/// `1..=cap` seconds.
pub fn effective_timeout(monitor: &monitor::Model, cap: Duration) -> Duration {
    let configured = Duration::from_secs(monitor.timeout_seconds.max(1) as u64);
    configured.min(cap)
}

/// Dispatches probes by monitor kind. Holds only the shared resolver;
/// everything else is built per probe.
pub struct Prober<P: ConnectionProvider> {
    resolver: Arc<Resolver<P>>,
}

impl<P: ConnectionProvider> Prober<P> {
    pub fn new(resolver: Arc<Resolver<P>>) -> Self {
        Self { resolver }
    }

    /// Run the monitor's probe once. Always returns an outcome; failures
    /// are folded into `down`/`degraded` statuses, never errors.
    #[tracing::instrument(skip(self, monitor), fields(monitor_id = %monitor.id, kind = ?monitor.kind))]
    pub async fn run(&self, monitor: &monitor::Model, timeout: Duration) -> ProbeOutcome {
        match monitor.kind {
            MonitorKind::Http => http::probe(monitor, timeout).await,
            MonitorKind::Ssl => tls::probe(monitor, timeout).await,
            MonitorKind::Dns => dns::probe(monitor, &self.resolver, timeout).await,
            MonitorKind::Domain => whois::probe(monitor, timeout).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::types::{NotificationConfig, ProbeConfig, StringList};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn monitor(timeout_seconds: i32) -> monitor::Model {
        monitor::Model {
            id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            name: "m".into(),
            kind: MonitorKind::Http,
            target: "https://example.org".into(),
            enabled: true,
            interval_seconds: 60,
            timeout_seconds,
            regions: StringList(vec!["us-east".into()]),
            config: ProbeConfig::default(),
            notification_config: NotificationConfig::default(),
            tags: serde_json::json!({}),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn effective_timeout_clamps_to_cap() {
        let cap = Duration::from_secs(30);
        assert_eq!(
            effective_timeout(&monitor(10), cap),
            Duration::from_secs(10)
        );
        assert_eq!(
            effective_timeout(&monitor(90), cap),
            Duration::from_secs(30)
        );
        assert_eq!(effective_timeout(&monitor(0), cap), Duration::from_secs(1));
    }

    #[test]
    fn timeout_outcome_is_down_with_message() {
        let o = ProbeOutcome::timed_out(Duration::from_secs(5));
        assert_eq!(o.status, CheckStatus::Down);
        assert!(o.error.unwrap().contains("Timed out"));
    }
}
