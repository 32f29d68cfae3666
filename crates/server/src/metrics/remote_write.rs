//! Remote-write loop: drains the registry into snappy-compressed
//! protobuf pushes, one request per tenant.
//!
//! Failed pushes are logged and dropped; the next tick sends a fresh
//! snapshot, so there is no buffering beyond one interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use prometheus::proto::{MetricFamily, MetricType};
use prost::Message;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::RemoteSinkConfig;
use crate::error::EngineError;
use crate::metrics::Collector;
use crate::metrics::prompb::{Label, Sample, TimeSeries, WriteRequest};

/// Only these metric families leave the process.
const FORWARDED_PREFIXES: &[&str] = &["uptime_", "ssl_", "dns_", "domain_"];

const REMOTE_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteWriter {
    config: RemoteSinkConfig,
    client: reqwest::Client,
}

impl RemoteWriter {
    pub fn new(config: RemoteSinkConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(REMOTE_WRITE_TIMEOUT)
            .build()
            .map_err(|e| EngineError::RemoteWriteTransport(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Background loop: flush on every interval tick until shutdown.
    pub async fn run(self, collector: Arc<Collector>, mut shutdown: watch::Receiver<bool>) {
        info!(url = %self.config.url, "Starting remote write loop");
        let mut ticker = tokio::time::interval(self.config.flush_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.flush(&collector).await {
                        warn!(error = %e, "Remote write flush failed; dropping snapshot");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Remote write loop stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Gather, partition by tenant and push. One failing tenant does not
    /// block the others.
    pub async fn flush(&self, collector: &Collector) -> Result<(), EngineError> {
        let families = collector.registry().gather();
        let timestamp = now_millis();
        let by_tenant = partition_by_tenant(&families, timestamp);
        if by_tenant.is_empty() {
            return Ok(());
        }

        debug!(tenants = by_tenant.len(), "Pushing metrics snapshot");
        let mut last_err = None;
        for (tenant, series) in by_tenant {
            for batch in series.chunks(self.config.batch_size.max(1)) {
                if let Err(e) = self.push_batch(&tenant, batch).await {
                    warn!(tenant = %tenant, error = %e, "Remote write rejected batch");
                    last_err = Some(e);
                }
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    async fn push_batch(&self, tenant: &str, series: &[TimeSeries]) -> Result<(), EngineError> {
        let request = WriteRequest {
            timeseries: series.to_vec(),
        };
        let payload = request.encode_to_vec();
        let compressed = snap::raw::Encoder::new()
            .compress_vec(&payload)
            .map_err(|e| EngineError::RemoteWriteTransport(e.to_string()))?;

        let url = format!("{}/api/v1/push", self.config.url.trim_end_matches('/'));
        let mut http = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-protobuf")
            .header("Content-Encoding", "snappy")
            .header("X-Prometheus-Remote-Write-Version", "0.1.0")
            .header(&self.config.tenant_header, tenant)
            .body(compressed);
        if !self.config.auth_token.is_empty() {
            http = http.bearer_auth(&self.config.auth_token);
        }

        let response = http
            .send()
            .await
            .map_err(|e| EngineError::RemoteWriteTransport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(EngineError::RemoteWrite(response.status().as_u16()));
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Convert gathered families into remote-write series keyed by tenant.
/// Series without a `tenant_id` label are skipped; histograms expand into
/// `_bucket`/`_sum`/`_count` series.
pub(crate) fn partition_by_tenant(
    families: &[MetricFamily],
    timestamp: i64,
) -> HashMap<String, Vec<TimeSeries>> {
    let mut by_tenant: HashMap<String, Vec<TimeSeries>> = HashMap::new();

    for family in families {
        let name = family.get_name();
        if !FORWARDED_PREFIXES.iter().any(|p| name.starts_with(p)) {
            continue;
        }

        for metric in family.get_metric() {
            let labels: Vec<Label> = metric
                .get_label()
                .iter()
                .map(|pair| Label {
                    name: pair.get_name().to_string(),
                    value: pair.get_value().to_string(),
                })
                .collect();

            let Some(tenant) = labels
                .iter()
                .find(|l| l.name == "tenant_id")
                .map(|l| l.value.clone())
            else {
                continue;
            };
            let out = by_tenant.entry(tenant).or_default();

            match family.get_field_type() {
                MetricType::COUNTER => out.push(series(
                    name,
                    &labels,
                    metric.get_counter().get_value(),
                    timestamp,
                )),
                MetricType::GAUGE => out.push(series(
                    name,
                    &labels,
                    metric.get_gauge().get_value(),
                    timestamp,
                )),
                MetricType::HISTOGRAM => {
                    let histogram = metric.get_histogram();
                    for bucket in histogram.get_bucket() {
                        let mut bucket_labels = labels.clone();
                        bucket_labels.push(Label {
                            name: "le".to_string(),
                            value: format_bound(bucket.get_upper_bound()),
                        });
                        out.push(series(
                            &format!("{name}_bucket"),
                            &bucket_labels,
                            bucket.get_cumulative_count() as f64,
                            timestamp,
                        ));
                    }
                    let mut inf_labels = labels.clone();
                    inf_labels.push(Label {
                        name: "le".to_string(),
                        value: "+Inf".to_string(),
                    });
                    out.push(series(
                        &format!("{name}_bucket"),
                        &inf_labels,
                        histogram.get_sample_count() as f64,
                        timestamp,
                    ));
                    out.push(series(
                        &format!("{name}_sum"),
                        &labels,
                        histogram.get_sample_sum(),
                        timestamp,
                    ));
                    out.push(series(
                        &format!("{name}_count"),
                        &labels,
                        histogram.get_sample_count() as f64,
                        timestamp,
                    ));
                }
                _ => {}
            }
        }
    }

    by_tenant
}

fn series(name: &str, labels: &[Label], value: f64, timestamp: i64) -> TimeSeries {
    let mut all_labels = Vec::with_capacity(labels.len() + 1);
    all_labels.push(Label {
        name: "__name__".to_string(),
        value: name.to_string(),
    });
    all_labels.extend_from_slice(labels);
    TimeSeries {
        labels: all_labels,
        samples: vec![Sample { value, timestamp }],
    }
}

fn format_bound(bound: f64) -> String {
    if bound.is_infinite() {
        "+Inf".to_string()
    } else {
        format!("{bound}")
    }
}
