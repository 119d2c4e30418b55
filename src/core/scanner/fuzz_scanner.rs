// src/core/scanner/fuzz_scanner.rs

use futures::stream::{self, StreamExt};
use tracing::{debug, info};
use url::Url;

use super::dns_scanner::COMMON_SUBDOMAINS;
use super::probe::Probe;
use crate::core::models::FuzzResult;

/// Directory names tried by the path sweep.
pub const COMMON_DIRECTORIES: &[&str] = &["admin", "login", "test", "backup"];
/// Extensions combined with every directory name.
pub const COMMON_EXTENSIONS: &[&str] = &[".php", ".html", ".asp", ".js"];
/// Well-known API prefixes, resolved against the base URL's origin.
pub const API_ENDPOINTS: &[&str] = &["/api/v1/", "/api/v2/", "/api/user/", "/api/admin/"];
/// Page names appended to a dead URL when the directory sweep finds nothing.
pub const RECOVERY_PAGES: &[&str] = &["about", "contact", "login", "signup", "user", "admin"];

/// How a candidate word is turned into a full URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Standard reference resolution against the base URL.
    Relative,
    /// `{scheme}://{candidate}.{host}/`
    Subdomain,
    /// `{base}/{candidate}`
    Append,
    /// `{base}?{param}={candidate}`, or `&` when `base` already has a query.
    /// Any fragment on `base` is dropped.
    Query { param: &'static str },
}

impl JoinStrategy {
    /// Builds the candidate URL, or `None` when the base cannot carry it.
    pub fn join(&self, base: &str, candidate: &str) -> Option<String> {
        match self {
            JoinStrategy::Relative => Url::parse(base)
                .and_then(|b| b.join(candidate))
                .map(String::from)
                .ok(),
            JoinStrategy::Subdomain => {
                let parsed = Url::parse(base).ok()?;
                let host = parsed.host_str()?;
                let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
                Some(format!("{}://{}.{}{}/", parsed.scheme(), candidate, host, port))
            }
            JoinStrategy::Append => Some(format!("{}/{}", base.trim_end_matches('/'), candidate)),
            JoinStrategy::Query { param } => {
                let base = base.split('#').next().unwrap_or(base);
                let separator = if base.contains('?') { '&' } else { '?' };
                Some(format!("{}{}{}={}", base, separator, param, candidate))
            }
        }
    }
}

/// What a probe must report for a candidate to count as found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Reachable and not a 404 (HEAD).
    Exists,
    /// Reachable with a 2xx status (GET).
    Success,
}

/// Probes every candidate and returns the accepted URLs in candidate order.
///
/// Up to `workers` probes are in flight at once. Results are collected in
/// full before being filtered, so the output order never depends on which
/// request finished first. A failing candidate is simply left out.
pub async fn sweep<S: AsRef<str>>(
    probe: &dyn Probe,
    base: &str,
    candidates: &[S],
    strategy: JoinStrategy,
    acceptance: Acceptance,
    workers: usize,
) -> FuzzResult {
    let urls: Vec<String> = candidates
        .iter()
        .filter_map(|c| strategy.join(base, c.as_ref()))
        .collect();

    debug!(base, candidates = urls.len(), ?strategy, ?acceptance, "Starting sweep.");
    let found = probe_all(probe, urls, acceptance, workers).await;
    debug!(base, found = found.len(), "Sweep finished.");
    found
}

/// Probes ready-made URLs through one pool of `workers` and keeps the
/// accepted ones, in input order.
async fn probe_all(probe: &dyn Probe, urls: Vec<String>, acceptance: Acceptance, workers: usize) -> FuzzResult {
    let verdicts: Vec<(String, bool)> = stream::iter(urls)
        .map(move |url| async move {
            let accepted = match acceptance {
                Acceptance::Exists => probe.exists(&url).await,
                Acceptance::Success => probe.fetch(&url).await.is_success(),
            };
            (url, accepted)
        })
        .buffered(workers.max(1))
        .collect()
        .await;

    verdicts
        .into_iter()
        .filter_map(|(url, accepted)| accepted.then_some(url))
        .collect()
}

/// Every directory combined with every extension, directory-major.
pub fn directory_candidates() -> Vec<String> {
    COMMON_DIRECTORIES
        .iter()
        .flat_map(|dir| COMMON_EXTENSIONS.iter().map(move |ext| format!("{}{}", dir, ext)))
        .collect()
}

/// Looks for common files next to `base_url`.
pub async fn brute_force_directories(probe: &dyn Probe, base_url: &str, workers: usize) -> FuzzResult {
    info!(base_url, "Brute-forcing common directories.");
    sweep(probe, base_url, &directory_candidates(), JoinStrategy::Relative, Acceptance::Exists, workers).await
}

/// Appends common page names to `base_url`.
pub async fn brute_force_pages(probe: &dyn Probe, base_url: &str, workers: usize) -> FuzzResult {
    info!(base_url, "Brute-forcing common pages.");
    sweep(probe, base_url, RECOVERY_PAGES, JoinStrategy::Append, Acceptance::Exists, workers).await
}

/// Tries common virtual hosts under the host of `base_url`.
pub async fn fuzz_virtual_hosts(probe: &dyn Probe, base_url: &str, workers: usize) -> FuzzResult {
    info!(base_url, "Fuzzing virtual hosts.");
    sweep(probe, base_url, COMMON_SUBDOMAINS, JoinStrategy::Subdomain, Acceptance::Success, workers).await
}

/// Tries well-known API prefixes on the origin of every base URL.
///
/// All bases share a single pool, so no more than `workers` requests are in
/// flight however many API hosts DNS enumeration turned up.
///
/// # Arguments
/// * `probe` - The probe used for every request.
/// * `base_urls` - The target URL followed by any API hosts found in DNS data.
/// * `workers` - Maximum number of concurrent requests.
///
/// # Returns
/// The endpoints that answered with a 2xx status, base-major in candidate order.
pub async fn test_api_endpoints<S: AsRef<str>>(probe: &dyn Probe, base_urls: &[S], workers: usize) -> FuzzResult {
    let urls: Vec<String> = base_urls
        .iter()
        .flat_map(|base| API_ENDPOINTS.iter().filter_map(move |e| JoinStrategy::Relative.join(base.as_ref(), e)))
        .collect();
    info!(bases = base_urls.len(), candidates = urls.len(), "Testing API endpoints.");
    probe_all(probe, urls, Acceptance::Success, workers).await
}
