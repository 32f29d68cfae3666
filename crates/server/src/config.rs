use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Number of cooperative probe workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Upper bound on any single probe, seconds. Monitors may configure
    /// less but never more.
    #[serde(default = "default_check_timeout")]
    pub check_timeout_seconds: u64,
    /// Seconds between due-monitor scans.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Bounded job queue capacity; overflow jobs are dropped and retried
    /// on a later tick.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            check_timeout_seconds: default_check_timeout(),
            tick_interval_seconds: default_tick_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_seconds)
    }
}

/// Prometheus remote-write sink (Mimir-compatible), one push per tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSinkConfig {
    /// Base URL; the engine posts to `{url}/api/v1/push`. Empty disables
    /// remote write (the pull endpoint stays available).
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub auth_token: String,
}

impl Default for RemoteSinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            tenant_header: default_tenant_header(),
            flush_interval_seconds: default_flush_interval(),
            batch_size: default_batch_size(),
            auth_token: String::new(),
        }
    }
}

impl RemoteSinkConfig {
    pub fn enabled(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    /// Recursive resolver the DNS probe queries.
    #[serde(default = "default_resolver")]
    pub resolver: SocketAddr,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            resolver: default_resolver(),
        }
    }
}

/// A named vantage point. Probes run once per region per tick.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub provider: String,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub remote_sink: RemoteSinkConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub regions: HashMap<String, RegionConfig>,
}

fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> u32 {
    25
}
fn default_worker_count() -> usize {
    10
}
fn default_check_timeout() -> u64 {
    30
}
fn default_tick_interval() -> u64 {
    10
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_tenant_header() -> String {
    "X-Scope-OrgID".to_string()
}
fn default_flush_interval() -> u64 {
    10
}
fn default_batch_size() -> usize {
    1000
}
fn default_resolver() -> SocketAddr {
    SocketAddr::from(([8, 8, 8, 8], 53))
}

fn default_regions() -> HashMap<String, RegionConfig> {
    [
        ("us-east", "US East", "Virginia"),
        ("eu-west", "EU West", "Ireland"),
        ("asia-pac", "Asia Pacific", "Singapore"),
    ]
    .into_iter()
    .map(|(tag, name, location)| {
        (
            tag.to_string(),
            RegionConfig {
                name: name.to_string(),
                location: location.to_string(),
                provider: "aws".to_string(),
            },
        )
    })
    .collect()
}

/// Load application configuration from `config.yaml` + environment
/// overrides (`UPTIME` prefix, `__` path separator, e.g.
/// `UPTIME__DATABASE__URL`).
///
/// Returns a `ConfigError` instead of panicking so the caller can decide
/// how to fail. Configuration is loaded once at start and immutable
/// thereafter.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File, FileFormat};
    let cfg = Config::builder()
        .add_source(
            File::with_name("config")
                .format(FileFormat::Yaml)
                .required(false),
        )
        .add_source(Environment::with_prefix("UPTIME").separator("__"))
        .build()?;

    let mut app: AppConfig = cfg.try_deserialize()?;

    if app.database.url.is_empty() {
        return Err(ConfigError::Validation("database.url must be set".into()));
    }
    if app.scheduler.worker_count == 0 {
        return Err(ConfigError::Validation(
            "scheduler.worker_count must be > 0".into(),
        ));
    }
    if !(1..=60).contains(&app.scheduler.check_timeout_seconds) {
        return Err(ConfigError::Validation(
            "scheduler.check_timeout_seconds must be within 1..=60".into(),
        ));
    }
    if app.scheduler.tick_interval_seconds == 0 {
        return Err(ConfigError::Validation(
            "scheduler.tick_interval_seconds must be > 0".into(),
        ));
    }
    if app.regions.is_empty() {
        app.regions = default_regions();
    }

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_defaults() {
        let s = SchedulerConfig::default();
        assert_eq!(s.worker_count, 10);
        assert_eq!(s.tick_interval(), Duration::from_secs(10));
        assert_eq!(s.check_timeout(), Duration::from_secs(30));
        assert_eq!(s.queue_capacity, 1000);
    }

    #[test]
    fn remote_sink_disabled_without_url() {
        let r = RemoteSinkConfig::default();
        assert!(!r.enabled());
        assert_eq!(r.tenant_header, "X-Scope-OrgID");
        assert_eq!(r.flush_interval(), Duration::from_secs(10));
        assert_eq!(r.batch_size, 1000);
    }

    #[test]
    fn resolver_default_is_a_socket_addr() {
        let d = DnsConfig::default();
        assert_eq!(d.resolver.port(), 53);
    }

    #[test]
    fn default_region_catalog_has_three_vantage_points() {
        let regions = default_regions();
        assert_eq!(regions.len(), 3);
        assert!(regions.contains_key("us-east"));
        assert!(regions.contains_key("eu-west"));
        assert!(regions.contains_key("asia-pac"));
    }
}
