use std::time::Duration;
use thiserror::Error;

/// Probe-level failures. Every variant maps onto a `down` or `degraded`
/// check result; probes never abort the pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbeFailure {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Request failed: {0}")]
    Network(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Unexpected status code: {0}")]
    UnexpectedStatus(u16),
    #[error("Search string not found in response")]
    SearchStringMissing,
    #[error("Failed to read response body: {0}")]
    BodyRead(String),
    #[error("TLS connection failed: {0}")]
    TlsHandshake(String),
    #[error("No certificates found")]
    EmptyCertificateChain,
    #[error("Certificate not yet valid")]
    CertificateNotYetValid,
    #[error("Certificate has expired")]
    CertificateExpired,
    #[error("DNS query failed: {0}")]
    DnsLookup(String),
    #[error("No {0} records found")]
    NoRecords(String),
    #[error("Expected DNS values not found")]
    DnsValueMismatch,
    #[error("WHOIS lookup failed: {0}")]
    WhoisLookup(String),
    #[error("Could not extract expiry date from WHOIS data")]
    WhoisUnparseable,
    #[error("Domain has expired")]
    DomainExpired,
}

impl ProbeFailure {
    /// Failures that indicate the target is reachable but unhealthy in a
    /// soft way; these yield `degraded` rather than `down`.
    pub fn is_degradation(&self) -> bool {
        matches!(
            self,
            ProbeFailure::BodyRead(_) | ProbeFailure::WhoisUnparseable
        )
    }
}

/// Store adapter errors. Write failures propagate to the caller; the
/// worker logs and continues, so the status cache may lag by one result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Group member weights sum to {0:.3}, expected 1.0 ±0.01")]
    WeightSum(f64),
    #[error("Incident already acknowledged")]
    AlreadyAcknowledged,
}

/// Engine-level errors surfaced from long-lived tasks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Remote write failed with status {0}")]
    RemoteWrite(u16),
    #[error("Remote write transport error: {0}")]
    RemoteWriteTransport(String),
    #[error("Metrics encoding error: {0}")]
    Metrics(String),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::RemoteWrite(_) | EngineError::RemoteWriteTransport(_)
        )
    }
}
