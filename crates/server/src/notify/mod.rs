//! Notification dispatch seam.
//!
//! Channel transports are external collaborators; the engine only decides
//! *when* to notify (failure-count threshold, reminders, recovery), hands
//! a summary to the transport, and records delivery outcomes. The default
//! transport logs the payload and reports success, which keeps the policy
//! path fully exercisable without any external sink.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::entity::incident;
use crate::entity::types::{NotificationChannel, NotificationConfig, Severity};
use crate::metrics::Collector;

/// What a notification is about: a monitor incident or a group incident.
#[derive(Debug, Clone)]
pub struct Notification {
    pub tenant_id: String,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub severity: Severity,
    pub message: String,
    pub recovered: bool,
}

/// External delivery transport for one channel kind.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Deliver the notification; returns whether it was delivered and how
    /// long delivery took.
    async fn send(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
    ) -> (bool, Duration);
}

/// Default transport: structured log line, always delivered.
pub struct LogTransport;

#[async_trait]
impl ChannelTransport for LogTransport {
    async fn send(
        &self,
        channel: &NotificationChannel,
        notification: &Notification,
    ) -> (bool, Duration) {
        let start = Instant::now();
        info!(
            channel = %channel.kind,
            subject_id = %notification.subject_id,
            subject = %notification.subject_name,
            severity = ?notification.severity,
            recovered = notification.recovered,
            message = %notification.message,
            "Dispatching notification"
        );
        (true, start.elapsed())
    }
}

/// Fans a notification out to every enabled channel and records the
/// per-channel outcome. A failing channel never blocks the others.
pub struct Dispatcher {
    transport: Arc<dyn ChannelTransport>,
    metrics: Arc<Collector>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ChannelTransport>, metrics: Arc<Collector>) -> Self {
        Self { transport, metrics }
    }

    /// Returns how many channels accepted the notification.
    pub async fn send_all(
        &self,
        channels: &[NotificationChannel],
        notification: &Notification,
    ) -> usize {
        let mut delivered = 0;
        for channel in channels.iter().filter(|c| c.enabled) {
            let (ok, latency) = self.transport.send(channel, notification).await;
            self.metrics.record_notification(
                &notification.tenant_id,
                &notification.subject_id.to_string(),
                &channel.kind,
                ok,
            );
            if ok {
                delivered += 1;
            } else {
                tracing::warn!(
                    channel = %channel.kind,
                    subject_id = %notification.subject_id,
                    latency_ms = latency.as_millis() as u64,
                    "Notification delivery failed"
                );
            }
        }
        delivered
    }
}

/// Failure-notification policy over an open incident: the first
/// notification fires once `affected_checks` reaches the configured
/// threshold, then repeats every `reminder_interval` affected checks.
pub fn should_notify_failure(config: &NotificationConfig, incident: &incident::Model) -> bool {
    if config.channels.is_empty() {
        return false;
    }
    let threshold = config.on_failure_count.max(1);
    if incident.affected_checks < threshold {
        return false;
    }
    if incident.notifications_sent == 0 {
        return true;
    }
    config.reminder_interval > 0 && incident.affected_checks % config.reminder_interval == 0
}

/// Recovery notifications are opt-in and fire once per resolution.
pub fn should_notify_recovery(config: &NotificationConfig) -> bool {
    config.on_recovery && !config.channels.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn channel() -> NotificationChannel {
        NotificationChannel {
            kind: "webhook".into(),
            config: serde_json::Map::new(),
            enabled: true,
        }
    }

    fn incident(affected: i32, sent: i32) -> incident::Model {
        incident::Model {
            id: Uuid::new_v4(),
            monitor_id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            started_at: OffsetDateTime::UNIX_EPOCH,
            resolved_at: None,
            severity: Severity::Critical,
            downtime_minutes: 0,
            affected_checks: affected,
            notifications_sent: sent,
            acknowledged_at: None,
            acknowledged_by: None,
        }
    }

    fn config(on_failure_count: i32, reminder_interval: i32) -> NotificationConfig {
        NotificationConfig {
            channels: vec![channel()],
            on_failure_count,
            on_recovery: true,
            reminder_interval,
        }
    }

    #[test]
    fn first_notification_waits_for_threshold() {
        let cfg = config(3, 0);
        assert!(!should_notify_failure(&cfg, &incident(2, 0)));
        assert!(should_notify_failure(&cfg, &incident(3, 0)));
    }

    #[test]
    fn reminders_repeat_on_interval() {
        let cfg = config(1, 5);
        assert!(should_notify_failure(&cfg, &incident(1, 0)));
        assert!(!should_notify_failure(&cfg, &incident(4, 1)));
        assert!(should_notify_failure(&cfg, &incident(5, 1)));
        assert!(should_notify_failure(&cfg, &incident(10, 2)));
    }

    #[test]
    fn no_reminders_without_interval() {
        let cfg = config(1, 0);
        assert!(!should_notify_failure(&cfg, &incident(7, 1)));
    }

    #[test]
    fn zero_threshold_behaves_like_one() {
        let cfg = config(0, 0);
        assert!(should_notify_failure(&cfg, &incident(1, 0)));
    }

    #[test]
    fn no_channels_means_no_notifications() {
        let mut cfg = config(1, 1);
        cfg.channels.clear();
        assert!(!should_notify_failure(&cfg, &incident(5, 0)));
        assert!(!should_notify_recovery(&cfg));
    }
}
