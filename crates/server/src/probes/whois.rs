//! Domain registration probe: WHOIS lookup over TCP port 43 with IANA
//! referral chasing, then expiry-date extraction from the flat-text
//! response.

use std::time::{Duration, Instant};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::entity::monitor;
use crate::entity::types::CheckStatus;
use crate::error::ProbeFailure;
use crate::probes::ProbeOutcome;

const IANA_WHOIS: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;

/// Responses larger than this are truncated; expiry labels appear early.
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

/// Expiry labels seen across registry/registrar responses, matched
/// case-insensitively. Longer labels come first so `Expiry Date:` never
/// loses to `Expiry:`.
const EXPIRY_LABELS: &[&str] = &[
    "registrar registration expiration date:",
    "registry expiry date:",
    "expiration date:",
    "expiry date:",
    "expires:",
    "expiry:",
    "paid-till:",
];

pub async fn probe(monitor: &monitor::Model, deadline: Duration) -> ProbeOutcome {
    let domain = registered_name(&monitor.target);
    let start = Instant::now();

    let response = match lookup(&domain, deadline).await {
        Ok(response) => response,
        Err(failure) => return ProbeOutcome::failed(&failure, start.elapsed()),
    };
    let elapsed = start.elapsed();

    let Some(expiry) = parse_expiry(&response) else {
        return ProbeOutcome::failed(&ProbeFailure::WhoisUnparseable, elapsed);
    };

    let now = OffsetDateTime::now_utc();
    let days_until_expiry = (expiry - now).whole_days();
    let mut outcome = ProbeOutcome::up(elapsed)
        .with_detail(
            "expiry_date",
            expiry.format(&Rfc3339).unwrap_or_else(|_| expiry.to_string()),
        )
        .with_detail("days_until_expiry", days_until_expiry);

    if now > expiry {
        outcome.status = CheckStatus::Down;
        outcome.error = Some(ProbeFailure::DomainExpired.to_string());
        return outcome;
    }

    if monitor.config.domain_min_days_before_expiry > 0
        && days_until_expiry < monitor.config.domain_min_days_before_expiry
    {
        outcome.status = CheckStatus::Degraded;
        outcome.error = Some(format!("Domain expires in {days_until_expiry} days"));
        return outcome;
    }

    outcome
}

/// Strip scheme and path so URL-shaped targets resolve to their
/// registered name.
pub(crate) fn registered_name(target: &str) -> String {
    target
        .split_once("://")
        .map_or(target, |(_, rest)| rest)
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Query IANA for the authoritative registry server, then the registry,
/// then (once) the registrar server it refers to.
async fn lookup(domain: &str, deadline: Duration) -> Result<String, ProbeFailure> {
    let start = Instant::now();
    let remaining = |start: Instant| {
        deadline
            .checked_sub(start.elapsed())
            .ok_or(ProbeFailure::Timeout(deadline))
    };

    let tld = domain.rsplit('.').next().unwrap_or(domain);
    let iana = query(IANA_WHOIS, tld, remaining(start)?).await?;
    let registry = field_value(&iana, "refer:").unwrap_or_else(|| IANA_WHOIS.to_string());

    let mut response = query(&registry, domain, remaining(start)?).await?;

    if let Some(registrar) = field_value(&response, "registrar whois server:") {
        if registrar != registry {
            if let Ok(budget) = remaining(start) {
                if let Ok(refined) = query(&registrar, domain, budget).await {
                    response = refined;
                }
            }
        }
    }

    Ok(response)
}

async fn query(server: &str, request: &str, deadline: Duration) -> Result<String, ProbeFailure> {
    let run = async {
        let mut stream = TcpStream::connect((server, WHOIS_PORT))
            .await
            .map_err(|e| ProbeFailure::WhoisLookup(format!("{server}: {e}")))?;
        stream
            .write_all(format!("{request}\r\n").as_bytes())
            .await
            .map_err(|e| ProbeFailure::WhoisLookup(e.to_string()))?;

        let mut buf = Vec::new();
        stream
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ProbeFailure::WhoisLookup(e.to_string()))?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    };

    timeout(deadline, run)
        .await
        .map_err(|_| ProbeFailure::Timeout(deadline))?
}

fn field_value(response: &str, label: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let line = line.trim();
        let prefix = line.get(..label.len())?;
        if prefix.eq_ignore_ascii_case(label) {
            let value = line[label.len()..].trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// Extract the registration expiry from a WHOIS response. Returns `None`
/// when no known label carries a parseable date.
pub(crate) fn parse_expiry(response: &str) -> Option<OffsetDateTime> {
    for label in EXPIRY_LABELS {
        if let Some(raw) = field_value(response, label) {
            if let Some(parsed) = parse_date(&raw) {
                return Some(parsed);
            }
        }
    }
    None
}

fn parse_date(raw: &str) -> Option<OffsetDateTime> {
    // Registrars sometimes append a trailing zone name ("... UTC").
    let raw = raw.trim().trim_end_matches(" UTC").trim();

    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(dt);
    }

    let datetime_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(raw, &datetime_format) {
        return Some(dt.assume_utc());
    }

    let date_formats = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[day]-[month repr:short case_sensitive:false]-[year]"),
        format_description!("[year].[month].[day]"),
    ];
    for format in date_formats {
        if let Ok(date) = Date::parse(raw, format) {
            return Some(date.midnight().assume_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn strips_scheme_and_path() {
        assert_eq!(registered_name("https://example.org/about"), "example.org");
        assert_eq!(registered_name("example.org"), "example.org");
    }

    #[test]
    fn parses_registry_expiry_rfc3339() {
        let text = "Domain Name: EXAMPLE.ORG\nRegistry Expiry Date: 2026-08-14T04:00:00Z\n";
        assert_eq!(
            parse_expiry(text).unwrap(),
            datetime!(2026-08-14 04:00:00 UTC)
        );
    }

    #[test]
    fn parses_case_insensitive_label_and_date_only() {
        let text = "expiration date: 2027-03-01\n";
        assert_eq!(
            parse_expiry(text).unwrap(),
            datetime!(2027-03-01 00:00:00 UTC)
        );
    }

    #[test]
    fn parses_paid_till_dotted() {
        let text = "paid-till: 2026.11.30\n";
        assert_eq!(
            parse_expiry(text).unwrap(),
            datetime!(2026-11-30 00:00:00 UTC)
        );
    }

    #[test]
    fn parses_day_month_abbrev_year() {
        let text = "Expires: 02-Jan-2027\n";
        assert_eq!(
            parse_expiry(text).unwrap(),
            datetime!(2027-01-02 00:00:00 UTC)
        );
    }

    #[test]
    fn unknown_labels_yield_none() {
        assert!(parse_expiry("Domain Name: EXAMPLE.ORG\nStatus: ok\n").is_none());
        assert!(parse_expiry("Expires: soon\n").is_none());
    }

    #[test]
    fn longer_labels_win_over_prefixes() {
        // `Expiry Date:` must not be consumed by the bare `Expiry:` label.
        let text = "Expiry Date: 2026-05-05\n";
        assert_eq!(
            parse_expiry(text).unwrap(),
            datetime!(2026-05-05 00:00:00 UTC)
        );
    }
}
