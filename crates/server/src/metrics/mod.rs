//! Process-wide metrics registry and recording surface.
//!
//! One [`Collector`] is created at startup and shared by every
//! subsystem. It is read by the pull endpoint and drained by the
//! remote-write loop; it is never reset. Metric names and label sets are
//! part of the wire contract.

pub mod prompb;
pub mod remote_write;

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use crate::entity::types::{CheckStatus, MonitorKind, Severity};
use crate::entity::{check_result, incident, monitor};

const BASE_LABELS: &[&str] = &[
    "tenant_id",
    "monitor_id",
    "monitor_name",
    "type",
    "target",
    "region",
];

pub struct Collector {
    registry: Registry,

    check_duration: HistogramVec,
    check_up: GaugeVec,
    checks_total: IntCounterVec,
    http_response_code: IntGaugeVec,

    ssl_days_until_expiry: IntGaugeVec,
    ssl_cert_valid: IntGaugeVec,

    dns_lookup_duration: HistogramVec,
    dns_record_count: IntGaugeVec,
    dns_resolution_success: IntGaugeVec,

    domain_days_until_expiry: IntGaugeVec,
    domain_valid: IntGaugeVec,

    sla_percentage: GaugeVec,
    slo_error_budget_remaining_minutes: GaugeVec,
    slo_violation: IntGaugeVec,

    incidents_total: IntCounterVec,
    incident_duration_minutes: GaugeVec,
    incidents_active: IntGaugeVec,
    incident_mttr_minutes: GaugeVec,
    incident_mtta_minutes: GaugeVec,

    group_health_score: GaugeVec,
    group_status: GaugeVec,

    notifications_sent_total: IntCounterVec,
    notifications_failed_total: IntCounterVec,

    scheduler_dropped_checks: IntCounterVec,
}

impl Collector {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let check_duration = HistogramVec::new(
            HistogramOpts::new(
                "uptime_check_duration_seconds",
                "Duration of uptime checks in seconds",
            )
            .buckets(vec![0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            BASE_LABELS,
        )?;
        let check_up = GaugeVec::new(
            Opts::new("uptime_check_up", "Whether the check is up (1) or down (0)"),
            BASE_LABELS,
        )?;
        let checks_total = IntCounterVec::new(
            Opts::new("uptime_checks_total", "Total number of checks performed"),
            &[
                "tenant_id",
                "monitor_id",
                "monitor_name",
                "type",
                "target",
                "region",
                "status",
            ],
        )?;
        let http_response_code = IntGaugeVec::new(
            Opts::new(
                "uptime_http_response_code",
                "HTTP response code of the last check",
            ),
            &["tenant_id", "monitor_id", "monitor_name", "target", "region"],
        )?;

        let ssl_days_until_expiry = IntGaugeVec::new(
            Opts::new(
                "ssl_cert_days_until_expiry",
                "Days until the TLS certificate expires",
            ),
            &["tenant_id", "monitor_id", "monitor_name", "domain", "issuer"],
        )?;
        let ssl_cert_valid = IntGaugeVec::new(
            Opts::new(
                "ssl_cert_valid",
                "Whether the TLS certificate is valid (1) or not (0)",
            ),
            &["tenant_id", "monitor_id", "monitor_name", "domain"],
        )?;

        let dns_lookup_duration = HistogramVec::new(
            HistogramOpts::new(
                "dns_lookup_duration_seconds",
                "Duration of DNS lookups in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &[
                "tenant_id",
                "monitor_id",
                "monitor_name",
                "domain",
                "record_type",
                "region",
            ],
        )?;
        let dns_record_count = IntGaugeVec::new(
            Opts::new("dns_record_count", "Number of DNS records found"),
            &[
                "tenant_id",
                "monitor_id",
                "monitor_name",
                "domain",
                "record_type",
            ],
        )?;
        let dns_resolution_success = IntGaugeVec::new(
            Opts::new(
                "dns_resolution_success",
                "Whether DNS resolution was successful (1) or not (0)",
            ),
            &[
                "tenant_id",
                "monitor_id",
                "monitor_name",
                "domain",
                "record_type",
            ],
        )?;

        let domain_days_until_expiry = IntGaugeVec::new(
            Opts::new(
                "domain_days_until_expiry",
                "Days until the domain registration expires",
            ),
            &["tenant_id", "monitor_id", "monitor_name", "domain"],
        )?;
        let domain_valid = IntGaugeVec::new(
            Opts::new(
                "domain_valid",
                "Whether the domain registration is valid (1) or not (0)",
            ),
            &["tenant_id", "monitor_id", "monitor_name", "domain"],
        )?;

        let sla_percentage = GaugeVec::new(
            Opts::new("uptime_sla_percentage", "Computed SLA uptime percentage"),
            &["tenant_id", "monitor_id", "monitor_name"],
        )?;
        let slo_error_budget_remaining_minutes = GaugeVec::new(
            Opts::new(
                "uptime_slo_error_budget_remaining_minutes",
                "Remaining error budget for the SLO period in minutes",
            ),
            &["tenant_id", "monitor_id", "monitor_name"],
        )?;
        let slo_violation = IntGaugeVec::new(
            Opts::new(
                "uptime_slo_violation",
                "Whether the SLO is currently violated (1) or met (0)",
            ),
            &["tenant_id", "monitor_id", "monitor_name"],
        )?;

        let incidents_total = IntCounterVec::new(
            Opts::new("uptime_incidents_total", "Total number of incidents opened"),
            &["tenant_id", "monitor_id", "monitor_name", "severity"],
        )?;
        let incident_duration_minutes = GaugeVec::new(
            Opts::new(
                "uptime_incident_duration_minutes",
                "Duration of the last resolved incident in minutes",
            ),
            &["tenant_id", "monitor_id", "monitor_name"],
        )?;
        let incidents_active = IntGaugeVec::new(
            Opts::new(
                "uptime_incidents_active",
                "Whether the monitor has an open incident (1) or not (0)",
            ),
            &["tenant_id", "monitor_id", "monitor_name"],
        )?;
        let incident_mttr_minutes = GaugeVec::new(
            Opts::new(
                "uptime_incident_mttr_minutes",
                "Time to recovery of the last resolved incident in minutes",
            ),
            &["tenant_id", "monitor_id", "monitor_name"],
        )?;
        let incident_mtta_minutes = GaugeVec::new(
            Opts::new(
                "uptime_incident_mtta_minutes",
                "Time to acknowledgement of the last acknowledged incident in minutes",
            ),
            &["tenant_id", "monitor_id", "monitor_name"],
        )?;

        let group_health_score = GaugeVec::new(
            Opts::new(
                "uptime_group_health_score",
                "Weighted health score of the group (0-100)",
            ),
            &["tenant_id", "group_id", "group_name"],
        )?;
        let group_status = GaugeVec::new(
            Opts::new(
                "uptime_group_status",
                "Overall group status (1 up, 0.5 degraded, 0 down)",
            ),
            &["tenant_id", "group_id", "group_name"],
        )?;

        let notifications_sent_total = IntCounterVec::new(
            Opts::new(
                "uptime_notifications_sent_total",
                "Notifications delivered to external channels",
            ),
            &["tenant_id", "subject_id", "channel_type"],
        )?;
        let notifications_failed_total = IntCounterVec::new(
            Opts::new(
                "uptime_notifications_failed_total",
                "Notification deliveries that failed",
            ),
            &["tenant_id", "subject_id", "channel_type"],
        )?;

        let scheduler_dropped_checks = IntCounterVec::new(
            Opts::new(
                "uptime_scheduler_dropped_checks_total",
                "Jobs dropped because the work queue was full",
            ),
            &["tenant_id", "monitor_id", "region"],
        )?;

        macro_rules! register {
            ($($vec:expr),+ $(,)?) => {
                $(registry.register(Box::new($vec.clone()))?;)+
            };
        }
        register!(
            check_duration,
            check_up,
            checks_total,
            http_response_code,
            ssl_days_until_expiry,
            ssl_cert_valid,
            dns_lookup_duration,
            dns_record_count,
            dns_resolution_success,
            domain_days_until_expiry,
            domain_valid,
            sla_percentage,
            slo_error_budget_remaining_minutes,
            slo_violation,
            incidents_total,
            incident_duration_minutes,
            incidents_active,
            incident_mttr_minutes,
            incident_mtta_minutes,
            group_health_score,
            group_status,
            notifications_sent_total,
            notifications_failed_total,
            scheduler_dropped_checks,
        );

        Ok(Self {
            registry,
            check_duration,
            check_up,
            checks_total,
            http_response_code,
            ssl_days_until_expiry,
            ssl_cert_valid,
            dns_lookup_duration,
            dns_record_count,
            dns_resolution_success,
            domain_days_until_expiry,
            domain_valid,
            sla_percentage,
            slo_error_budget_remaining_minutes,
            slo_violation,
            incidents_total,
            incident_duration_minutes,
            incidents_active,
            incident_mttr_minutes,
            incident_mtta_minutes,
            group_health_score,
            group_status,
            notifications_sent_total,
            notifications_failed_total,
            scheduler_dropped_checks,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }

    /// Record one check result: generic series plus the kind-specific
    /// families.
    pub fn record_check(&self, result: &check_result::Model, monitor: &monitor::Model) {
        let kind = kind_label(monitor.kind);
        let monitor_id = monitor.id.to_string();
        let base = [
            result.tenant_id.as_str(),
            monitor_id.as_str(),
            monitor.name.as_str(),
            kind,
            monitor.target.as_str(),
            result.region.as_str(),
        ];
        let seconds = f64::from(result.response_time_ms) / 1000.0;
        self.check_duration.with_label_values(&base).observe(seconds);
        self.check_up
            .with_label_values(&base)
            .set(if result.status == CheckStatus::Up { 1.0 } else { 0.0 });

        let status = status_label(result.status);
        self.checks_total
            .with_label_values(&[
                base[0], base[1], base[2], base[3], base[4], base[5], status,
            ])
            .inc();

        let tenant = result.tenant_id.as_str();
        let up = result.status == CheckStatus::Up;

        match monitor.kind {
            MonitorKind::Http => {
                if let Some(code) = result.status_code {
                    self.http_response_code
                        .with_label_values(&[
                            tenant,
                            &monitor_id,
                            &monitor.name,
                            &monitor.target,
                            &result.region,
                        ])
                        .set(i64::from(code));
                }
            }
            MonitorKind::Ssl => {
                if let Some(days) = detail_i64(result, "days_until_expiry") {
                    let issuer = detail_str(result, "issuer").unwrap_or_default();
                    self.ssl_days_until_expiry
                        .with_label_values(&[
                            tenant,
                            &monitor_id,
                            &monitor.name,
                            &monitor.target,
                            &issuer,
                        ])
                        .set(days);
                }
                self.ssl_cert_valid
                    .with_label_values(&[tenant, &monitor_id, &monitor.name, &monitor.target])
                    .set(i64::from(up));
            }
            MonitorKind::Dns => {
                let record_type = monitor
                    .config
                    .record_type
                    .clone()
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "A".to_string());
                self.dns_lookup_duration
                    .with_label_values(&[
                        tenant,
                        &monitor_id,
                        &monitor.name,
                        &monitor.target,
                        &record_type,
                        &result.region,
                    ])
                    .observe(seconds);
                if let Some(count) = detail_i64(result, "record_count") {
                    self.dns_record_count
                        .with_label_values(&[
                            tenant,
                            &monitor_id,
                            &monitor.name,
                            &monitor.target,
                            &record_type,
                        ])
                        .set(count);
                }
                self.dns_resolution_success
                    .with_label_values(&[
                        tenant,
                        &monitor_id,
                        &monitor.name,
                        &monitor.target,
                        &record_type,
                    ])
                    .set(i64::from(up));
            }
            MonitorKind::Domain => {
                if let Some(days) = detail_i64(result, "days_until_expiry") {
                    self.domain_days_until_expiry
                        .with_label_values(&[tenant, &monitor_id, &monitor.name, &monitor.target])
                        .set(days);
                }
                self.domain_valid
                    .with_label_values(&[tenant, &monitor_id, &monitor.name, &monitor.target])
                    .set(i64::from(up));
            }
        }
    }

    pub fn record_incident_opened(&self, incident: &incident::Model, monitor: &monitor::Model) {
        let monitor_id = monitor.id.to_string();
        self.incidents_total
            .with_label_values(&[
                &incident.tenant_id,
                &monitor_id,
                &monitor.name,
                severity_label(incident.severity),
            ])
            .inc();
        self.incidents_active
            .with_label_values(&[&incident.tenant_id, &monitor_id, &monitor.name])
            .set(1);
    }

    pub fn record_incident_resolved(&self, incident: &incident::Model, monitor: &monitor::Model) {
        let monitor_id = monitor.id.to_string();
        let labels = [incident.tenant_id.as_str(), monitor_id.as_str(), monitor.name.as_str()];
        self.incidents_active.with_label_values(&labels).set(0);
        self.incident_duration_minutes
            .with_label_values(&labels)
            .set(incident.downtime_minutes as f64);
        if let Some(resolved_at) = incident.resolved_at {
            let mttr = (resolved_at - incident.started_at).as_seconds_f64() / 60.0;
            self.incident_mttr_minutes
                .with_label_values(&labels)
                .set(mttr);
        }
    }

    pub fn record_incident_acknowledged(
        &self,
        incident: &incident::Model,
        monitor: &monitor::Model,
    ) {
        if let Some(acknowledged_at) = incident.acknowledged_at {
            let mtta = (acknowledged_at - incident.started_at).as_seconds_f64() / 60.0;
            self.incident_mtta_minutes
                .with_label_values(&[
                    &incident.tenant_id,
                    &monitor.id.to_string(),
                    &monitor.name,
                ])
                .set(mtta);
        }
    }

    /// SLA gauges: uptime%, violation flag, and the remaining error
    /// budget derived from the SLO target over the report period.
    pub fn record_sla_report(
        &self,
        tenant_id: &str,
        monitor_id: &str,
        monitor_name: &str,
        uptime_percentage: f64,
        downtime_minutes: i64,
        period_minutes: f64,
        target_uptime_percentage: Option<f64>,
        slo_met: bool,
    ) {
        let labels = [tenant_id, monitor_id, monitor_name];
        self.sla_percentage
            .with_label_values(&labels)
            .set(uptime_percentage);
        self.slo_violation
            .with_label_values(&labels)
            .set(i64::from(!slo_met));
        if let Some(target) = target_uptime_percentage {
            let allowed = period_minutes * (1.0 - target / 100.0);
            self.slo_error_budget_remaining_minutes
                .with_label_values(&labels)
                .set(allowed - downtime_minutes as f64);
        }
    }

    pub fn record_group_snapshot(
        &self,
        tenant_id: &str,
        group_id: &str,
        group_name: &str,
        health_score: f64,
        overall: CheckStatus,
    ) {
        let labels = [tenant_id, group_id, group_name];
        self.group_health_score
            .with_label_values(&labels)
            .set(health_score);
        self.group_status.with_label_values(&labels).set(match overall {
            CheckStatus::Up => 1.0,
            CheckStatus::Degraded => 0.5,
            CheckStatus::Down => 0.0,
        });
    }

    pub fn record_notification(
        &self,
        tenant_id: &str,
        subject_id: &str,
        channel_type: &str,
        delivered: bool,
    ) {
        let labels = [tenant_id, subject_id, channel_type];
        if delivered {
            self.notifications_sent_total.with_label_values(&labels).inc();
        } else {
            self.notifications_failed_total
                .with_label_values(&labels)
                .inc();
        }
    }

    pub fn record_scheduler_drop(&self, tenant_id: &str, monitor_id: &str, region: &str) {
        self.scheduler_dropped_checks
            .with_label_values(&[tenant_id, monitor_id, region])
            .inc();
    }
}

fn detail_i64(result: &check_result::Model, key: &str) -> Option<i64> {
    result.details.get(key).and_then(|v| v.as_i64())
}

fn detail_str(result: &check_result::Model, key: &str) -> Option<String> {
    result
        .details
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub(crate) fn kind_label(kind: MonitorKind) -> &'static str {
    match kind {
        MonitorKind::Http => "http",
        MonitorKind::Ssl => "ssl",
        MonitorKind::Dns => "dns",
        MonitorKind::Domain => "domain",
    }
}

pub(crate) fn status_label(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Up => "up",
        CheckStatus::Down => "down",
        CheckStatus::Degraded => "degraded",
    }
}

pub(crate) fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}
