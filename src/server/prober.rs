//! One bounded-time HTTP check of a website.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::db::models::{CheckResult, CheckStatus};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    /// Hard ceiling on a single request, connect included.
    pub timeout: Duration,
    /// Responses slower than this are classified SLOW.
    pub slow_threshold: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
        }
    }
}

/// Classifies a successful response by its latency. The threshold itself is
/// still UP.
pub fn classify(elapsed_ms: u64, slow_threshold_ms: u64) -> CheckStatus {
    if elapsed_ms > slow_threshold_ms {
        CheckStatus::Slow
    } else {
        CheckStatus::Up
    }
}

fn success_message(status: CheckStatus, elapsed_ms: u64) -> String {
    match status {
        CheckStatus::Slow => format!("Website is UP but SLOW. Response Time: {elapsed_ms}ms"),
        _ => format!("Website is running smoothly. Response Time: {elapsed_ms}ms"),
    }
}

/// Short, stable description of a transport failure for the record message.
fn describe_failure(e: &reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_redirect() {
        "redirect"
    } else if e.is_body() || e.is_decode() {
        "body"
    } else if e.is_request() {
        "request"
    } else {
        "network"
    };
    format!("{kind}: {e}")
}

/// Anything that can check a target and classify the outcome.
///
/// Implementations must not fail: every outcome is a record.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &str) -> CheckResult;
}

/// Performs HTTP GET probes with a shared connection pool.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    settings: ProbeSettings,
}

impl Prober {
    pub fn new(settings: ProbeSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .user_agent(concat!("bodyguard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Probe for Prober {
    /// Probes `target` once. Transport failures become DOWN records and
    /// unusable URLs become ERROR records.
    async fn probe(&self, target: &str) -> CheckResult {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        let url = match Url::parse(target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                warn!(website = target, scheme = url.scheme(), "Refusing to probe unsupported scheme.");
                return CheckResult::failed(
                    target,
                    CheckStatus::Error,
                    elapsed_ms(start),
                    format!("Website check ERROR. Unsupported URL scheme '{}'", url.scheme()),
                );
            }
            Err(e) => {
                warn!(website = target, error = %e, "Refusing to probe malformed URL.");
                return CheckResult::failed(
                    target,
                    CheckStatus::Error,
                    elapsed_ms(start),
                    format!("Website check ERROR. Invalid URL: {e}"),
                );
            }
        };

        let outcome = self.client.get(url).send().await;
        let response_time_ms = elapsed_ms(start);

        match outcome {
            Ok(response) if response.status().is_success() => {
                let status = classify(
                    response_time_ms,
                    self.settings.slow_threshold.as_millis() as u64,
                );
                debug!(website = target, %status, response_time_ms, "Probe succeeded.");
                CheckResult::responded(
                    target,
                    status,
                    response.status().as_u16(),
                    response_time_ms,
                    success_message(status, response_time_ms),
                )
            }
            Ok(response) => {
                let http_status = response.status();
                debug!(website = target, status_code = http_status.as_u16(), "Probe got an error status.");
                CheckResult::failed(
                    target,
                    CheckStatus::Down,
                    response_time_ms,
                    format!("Website is DOWN. Error: HTTP {http_status}"),
                )
            }
            Err(e) => {
                debug!(website = target, error = %e, response_time_ms, "Probe failed.");
                CheckResult::failed(
                    target,
                    CheckStatus::Down,
                    response_time_ms,
                    format!("Website is DOWN. Error: {}", describe_failure(&e)),
                )
            }
        }
    }
}
