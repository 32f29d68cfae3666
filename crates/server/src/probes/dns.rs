//! DNS probe: queries one recursive resolver for the configured record
//! type and optionally matches answers against expected values.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use hickory_resolver::Resolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use hickory_resolver::name_server::{ConnectionProvider, TokioConnectionProvider};
use hickory_resolver::proto::rr::{RData, RecordType};
use tokio::time::timeout;

use crate::entity::monitor;
use crate::error::ProbeFailure;
use crate::probes::ProbeOutcome;

/// Build a resolver pinned to the configured recursive server.
pub fn build_resolver(addr: SocketAddr) -> Resolver<TokioConnectionProvider> {
    let servers = NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true);
    let config = ResolverConfig::from_parts(None, vec![], servers);
    Resolver::builder_with_config(config, TokioConnectionProvider::default()).build()
}

pub async fn probe<P: ConnectionProvider>(
    monitor: &monitor::Model,
    resolver: &Resolver<P>,
    deadline: Duration,
) -> ProbeOutcome {
    let record_type = record_type_of(monitor);
    let start = Instant::now();

    let lookup = match timeout(deadline, resolver.lookup(monitor.target.as_str(), record_type)).await {
        Err(_) => {
            return ProbeOutcome::failed(&ProbeFailure::Timeout(deadline), start.elapsed());
        }
        Ok(Err(e)) => {
            return ProbeOutcome::failed(
                &ProbeFailure::DnsLookup(e.to_string()),
                start.elapsed(),
            );
        }
        Ok(Ok(lookup)) => lookup,
    };
    let elapsed = start.elapsed();

    let answers: Vec<String> = lookup
        .record_iter()
        .filter_map(|record| render_answer(record.data(), record_type))
        .collect();

    if answers.is_empty() {
        return ProbeOutcome::failed(
            &ProbeFailure::NoRecords(record_type.to_string()),
            elapsed,
        );
    }

    let mut outcome = if expected_values_match(&monitor.config.expected_values, &answers) {
        ProbeOutcome::up(elapsed)
    } else {
        ProbeOutcome::failed(&ProbeFailure::DnsValueMismatch, elapsed)
    };

    outcome = outcome
        .with_detail("answers", answers.clone())
        .with_detail("record_count", answers.len());
    outcome
}

fn record_type_of(monitor: &monitor::Model) -> RecordType {
    monitor
        .config
        .record_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.to_ascii_uppercase().parse::<RecordType>().ok())
        .unwrap_or(RecordType::A)
}

/// Only answers of the queried type count; extra records in the answer
/// section (e.g. CNAME chains on an A query) are ignored, matching the
/// per-type extraction of the wire contract.
fn render_answer(data: &RData, queried: RecordType) -> Option<String> {
    match (data, queried) {
        (RData::A(a), RecordType::A) => Some(a.to_string()),
        (RData::AAAA(aaaa), RecordType::AAAA) => Some(aaaa.to_string()),
        (RData::CNAME(cname), RecordType::CNAME) => Some(cname.0.to_utf8()),
        (RData::MX(mx), RecordType::MX) => {
            Some(format!("{} {}", mx.preference(), mx.exchange().to_utf8()))
        }
        (RData::TXT(txt), RecordType::TXT) => Some(txt.to_string()),
        (RData::NS(ns), RecordType::NS) => Some(ns.0.to_utf8()),
        _ => None,
    }
}

/// Vacuously true when no expectations are configured; otherwise at least
/// one answer must contain at least one expected substring.
pub(crate) fn expected_values_match(expected: &[String], answers: &[String]) -> bool {
    if expected.is_empty() {
        return true;
    }
    expected
        .iter()
        .any(|needle| answers.iter().any(|answer| answer.contains(needle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_expectations_always_match() {
        assert!(expected_values_match(&[], &["1.2.3.4".into()]));
    }

    #[test]
    fn substring_match_counts() {
        let expected = vec!["93.184.216.34".to_string()];
        assert!(expected_values_match(
            &expected,
            &["93.184.216.34".to_string()]
        ));
        assert!(!expected_values_match(&expected, &["1.2.3.4".to_string()]));
    }

    #[test]
    fn any_expected_value_suffices() {
        let expected = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        assert!(expected_values_match(&expected, &["10.0.0.2".to_string()]));
    }
}
