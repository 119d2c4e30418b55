// src/core/scanner/probe.rs

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::core::models::{ProbeFailure, ProbeResult};

/// Upper bound for every single probe request.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub const USER_AGENT: &str = "WebGuard/0.1";

/// A single idempotent HTTP probe.
///
/// Implementations must never fail: network problems are folded into the
/// returned value so brute-force sweeps can keep going.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Cheap existence check: reachable and not a 404.
    async fn exists(&self, url: &str) -> bool;

    /// Full request capturing the status code or the network failure.
    async fn fetch(&self, url: &str) -> ProbeResult;
}

/// `reqwest`-backed probe with a bounded per-request timeout.
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Builds a probe whose requests give up after `timeout`.
    ///
    /// Production code goes through [`HttpProbe::standard`]; other bounds
    /// exist for tests.
    ///
    /// # Arguments
    /// * `timeout` - Bound applied to connecting and to the whole request.
    ///
    /// # Returns
    /// The probe, or the `reqwest` error if the TLS backend cannot be set up.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to build HTTP client for probing.");
                e
            })?;
        Ok(Self { client, timeout })
    }

    /// The probe every run uses, bounded by [`PROBE_TIMEOUT`].
    pub fn standard() -> Result<Self, reqwest::Error> {
        Self::new(PROBE_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Maps a transport error onto the probe failure taxonomy.
pub fn classify_error(e: &reqwest::Error) -> ProbeFailure {
    if e.is_timeout() {
        ProbeFailure::Timeout
    } else if e.is_connect() {
        ProbeFailure::Connect(e.to_string())
    } else if e.is_builder() {
        ProbeFailure::InvalidUrl(e.to_string())
    } else {
        ProbeFailure::Other(e.to_string())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(url, status = %status, "HEAD probe answered.");
                status != reqwest::StatusCode::NOT_FOUND
            }
            Err(e) => {
                debug!(url, error = %e, "HEAD probe failed, treating candidate as absent.");
                false
            }
        }
    }

    async fn fetch(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        let outcome = self.client.get(url).send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(url, status, latency_ms, "GET probe answered.");
                ProbeResult::answered(url, status, latency_ms)
            }
            Err(e) => {
                let failure = classify_error(&e);
                debug!(url, error = %failure, latency_ms, "GET probe failed.");
                ProbeResult::failed(url, failure, latency_ms)
            }
        }
    }
}
