//! TLS certificate probe: dials `host:port`, reads the leaf certificate
//! and applies validity-window and expiry-horizon checks.
//!
//! Chain verification is intentionally disabled on the handshake so the
//! probe can still report expiry details for certificates a strict
//! verifier would reject; the validity window is checked explicitly
//! afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use ::time::OffsetDateTime;
use ::time::format_description::well_known::Rfc3339;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

use crate::entity::monitor;
use crate::entity::types::CheckStatus;
use crate::error::ProbeFailure;
use crate::probes::ProbeOutcome;

const DEFAULT_TLS_PORT: u16 = 443;

pub async fn probe(monitor: &monitor::Model, deadline: Duration) -> ProbeOutcome {
    let start = Instant::now();

    let (host, port) = match parse_host_port(&monitor.target) {
        Ok(pair) => pair,
        Err(failure) => return ProbeOutcome::failed(&failure, start.elapsed()),
    };

    let leaf = match fetch_leaf_certificate(&host, port, deadline).await {
        Ok(leaf) => leaf,
        Err(failure) => return ProbeOutcome::failed(&failure, start.elapsed()),
    };
    let elapsed = start.elapsed();

    let info = match parse_certificate(&leaf) {
        Ok(info) => info,
        Err(failure) => return ProbeOutcome::failed(&failure, elapsed),
    };

    let now = OffsetDateTime::now_utc();
    let days_until_expiry = (info.not_after - now).whole_days();

    let mut outcome = ProbeOutcome::up(elapsed)
        .with_detail("days_until_expiry", days_until_expiry)
        .with_detail("issuer", info.issuer.clone())
        .with_detail("subject", info.subject.clone())
        .with_detail(
            "not_after",
            info.not_after
                .format(&Rfc3339)
                .unwrap_or_else(|_| info.not_after.to_string()),
        );

    if now < info.not_before {
        outcome.status = CheckStatus::Down;
        outcome.error = Some(ProbeFailure::CertificateNotYetValid.to_string());
        return outcome;
    }
    if now > info.not_after {
        outcome.status = CheckStatus::Down;
        outcome.error = Some(ProbeFailure::CertificateExpired.to_string());
        return outcome;
    }

    if monitor.config.check_expiry
        && monitor.config.min_days_before_expiry > 0
        && days_until_expiry < monitor.config.min_days_before_expiry
    {
        outcome.status = CheckStatus::Degraded;
        outcome.error = Some(format!("Certificate expires in {days_until_expiry} days"));
        return outcome;
    }

    outcome
}

/// Accepts `host`, `host:port`, or a URL; defaults to port 443.
pub(crate) fn parse_host_port(target: &str) -> Result<(String, u16), ProbeFailure> {
    let stripped = target
        .split_once("://")
        .map_or(target, |(_, rest)| rest)
        .split('/')
        .next()
        .unwrap_or_default();

    if stripped.is_empty() {
        return Err(ProbeFailure::InvalidTarget(target.to_string()));
    }

    match stripped.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port: u16 = port
                .parse()
                .map_err(|_| ProbeFailure::InvalidTarget(target.to_string()))?;
            Ok((host.to_string(), port))
        }
        // No port, or a bare IPv6 literal.
        _ => Ok((stripped.to_string(), DEFAULT_TLS_PORT)),
    }
}

async fn fetch_leaf_certificate(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<CertificateDer<'static>, ProbeFailure> {
    let tcp = timeout(deadline, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ProbeFailure::Timeout(deadline))?
        .map_err(|e| ProbeFailure::TlsHandshake(e.to_string()))?;

    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::default()))
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| ProbeFailure::InvalidTarget(host.to_string()))?;

    let stream = timeout(deadline, connector.connect(server_name, tcp))
        .await
        .map_err(|_| ProbeFailure::Timeout(deadline))?
        .map_err(|e| ProbeFailure::TlsHandshake(e.to_string()))?;

    let (_, session) = stream.get_ref();
    session
        .peer_certificates()
        .and_then(|certs| certs.first())
        .cloned()
        .map(CertificateDer::into_owned)
        .ok_or(ProbeFailure::EmptyCertificateChain)
}

struct CertificateInfo {
    subject: String,
    issuer: String,
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

fn parse_certificate(der: &CertificateDer<'_>) -> Result<CertificateInfo, ProbeFailure> {
    let (_, cert) = X509Certificate::from_der(der.as_ref())
        .map_err(|e| ProbeFailure::TlsHandshake(format!("certificate parse error: {e}")))?;
    Ok(CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        not_before: cert.validity().not_before.to_datetime(),
        not_after: cert.validity().not_after.to_datetime(),
    })
}

/// Signature checks stay enabled; only chain/identity verification is
/// skipped (the probe reports on the certificate itself).
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl Default for AcceptAnyServerCert {
    fn default() -> Self {
        Self {
            provider: CryptoProvider::get_default()
                .cloned()
                .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider())),
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_defaults_to_443() {
        assert_eq!(
            parse_host_port("example.org").unwrap(),
            ("example.org".to_string(), 443)
        );
    }

    #[test]
    fn host_with_port() {
        assert_eq!(
            parse_host_port("example.org:8443").unwrap(),
            ("example.org".to_string(), 8443)
        );
    }

    #[test]
    fn url_target_is_stripped() {
        assert_eq!(
            parse_host_port("https://example.org/some/path").unwrap(),
            ("example.org".to_string(), 443)
        );
        assert_eq!(
            parse_host_port("https://example.org:444/x").unwrap(),
            ("example.org".to_string(), 444)
        );
    }

    #[test]
    fn empty_target_is_rejected() {
        assert!(parse_host_port("https:///path").is_err());
    }
}
