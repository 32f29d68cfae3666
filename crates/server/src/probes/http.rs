//! HTTP(S) probe: one request, optional body match, redirect cap.

use std::time::{Duration, Instant};

use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder};

use crate::entity::monitor;
use crate::entity::types::CheckStatus;
use crate::error::ProbeFailure;
use crate::probes::{ProbeOutcome, elapsed_ms};

/// Redirect hop limit before the probe reports `down`.
const MAX_REDIRECTS: usize = 10;

/// Response bodies are read up to this many bytes when a search string
/// is configured.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn probe(monitor: &monitor::Model, timeout: Duration) -> ProbeOutcome {
    let start = Instant::now();

    let client = match Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return ProbeOutcome::failed(&ProbeFailure::Network(e.to_string()), start.elapsed());
        }
    };

    let request = match build_request(&client, monitor) {
        Ok(request) => request,
        Err(failure) => return ProbeOutcome::failed(&failure, start.elapsed()),
    };

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            let failure = if e.is_timeout() {
                ProbeFailure::Timeout(timeout)
            } else if e.is_redirect() {
                ProbeFailure::Network(format!("stopped after {MAX_REDIRECTS} redirects"))
            } else {
                ProbeFailure::Network(e.to_string())
            };
            return ProbeOutcome::failed(&failure, start.elapsed());
        }
    };

    let status_code = response.status().as_u16();
    let elapsed = start.elapsed();

    let mut expected = monitor.config.expected_status_codes.clone();
    if expected.is_empty() {
        expected.push(200);
    }
    if !expected.contains(&status_code) {
        let mut outcome = ProbeOutcome::failed(
            &ProbeFailure::UnexpectedStatus(status_code),
            elapsed,
        );
        outcome.status_code = Some(status_code as i32);
        return outcome;
    }

    // Body content check only runs when a search string is configured.
    if let Some(needle) = monitor
        .config
        .search_string
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        match read_body_capped(response).await {
            Ok(body) => {
                if !body.contains(needle) {
                    let mut outcome = ProbeOutcome::failed(
                        &ProbeFailure::SearchStringMissing,
                        start.elapsed(),
                    );
                    outcome.status_code = Some(status_code as i32);
                    return outcome;
                }
            }
            Err(e) => {
                // The endpoint answered with an accepted status but the
                // body could not be read: degraded, not down.
                let mut outcome = ProbeOutcome::failed(
                    &ProbeFailure::BodyRead(e.to_string()),
                    start.elapsed(),
                );
                outcome.status_code = Some(status_code as i32);
                return outcome;
            }
        }
    }

    let elapsed = start.elapsed();
    let response_time_ms = elapsed_ms(elapsed);
    let outcome = ProbeOutcome {
        status: CheckStatus::Up,
        response_time_ms,
        status_code: Some(status_code as i32),
        error: None,
        details: serde_json::Map::new(),
    };
    outcome
        .with_detail("status_code", status_code)
        .with_detail("response_time_ms", response_time_ms)
}

fn build_request(
    client: &Client,
    monitor: &monitor::Model,
) -> Result<RequestBuilder, ProbeFailure> {
    let method = monitor
        .config
        .method
        .as_deref()
        .unwrap_or("GET")
        .parse::<Method>()
        .map_err(|_| {
            ProbeFailure::InvalidTarget(format!(
                "invalid HTTP method {:?}",
                monitor.config.method
            ))
        })?;

    let mut request = client.request(method, &monitor.target);
    for (name, value) in &monitor.config.headers {
        request = request.header(name, value);
    }
    if let Some(body) = &monitor.config.body {
        request = request.body(body.clone());
    }
    if let Some(auth) = &monitor.config.basic_auth {
        request = request.basic_auth(&auth.username, Some(&auth.password));
    }
    Ok(request)
}

async fn read_body_capped(mut response: reqwest::Response) -> Result<String, reqwest::Error> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = MAX_BODY_BYTES - buf.len();
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
