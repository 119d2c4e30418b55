// src/core/scanner/dns_scanner.rs

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::models::{AnalysisFinding, DnsFindings, DnsResults, Severity};

/// Subdomain labels tried by active resolution and virtual host fuzzing.
pub const COMMON_SUBDOMAINS: &[&str] = &["www", "api", "mail", "ftp"];

/// Banner protocols inspected for API hints, in the order they are checked.
const BANNER_PROTOCOLS: &[&str] = &["http", "https"];

pub const DNSDUMPSTER_BASE_URL: &str = "https://api.dnsdumpster.com";

// --- Active resolution ---

/// A-record lookups, abstracted so enumeration can run without a network.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_a(&self, host: &str) -> Result<Vec<Ipv4Addr>, String>;
}

#[async_trait]
impl NameResolver for TokioAsyncResolver {
    async fn resolve_a(&self, host: &str) -> Result<Vec<Ipv4Addr>, String> {
        self.ipv4_lookup(host)
            .await
            .map(|lookup| lookup.iter().map(|a| a.0).collect())
            .map_err(|e| e.to_string())
    }
}

/// Builds the system resolver with a bounded per-query timeout.
pub fn build_resolver(timeout: Duration) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
}

/// Resolves every common subdomain of `domain` and keeps those with an A record.
///
/// Lookup failures of any kind just drop the candidate.
pub async fn discover_subdomains(resolver: &dyn NameResolver, domain: &str) -> Vec<String> {
    let mut found = Vec::new();
    for label in COMMON_SUBDOMAINS {
        let candidate = format!("{}.{}", label, domain);
        match resolver.resolve_a(&candidate).await {
            Ok(addresses) if !addresses.is_empty() => {
                debug!(host = %candidate, count = addresses.len(), "Subdomain resolved.");
                found.push(candidate);
            }
            Ok(_) => debug!(host = %candidate, "Subdomain resolved to no addresses."),
            Err(e) => debug!(host = %candidate, error = %e, "Subdomain did not resolve."),
        }
    }
    found
}

// --- Passive dataset ---

/// A host/IP/banner record set as served by the DNS dataset provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DnsDataset {
    #[serde(default)]
    pub a: Vec<HostRecord>,
    #[serde(default)]
    pub cname: Vec<CnameRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostRecord {
    pub host: String,
    #[serde(default)]
    pub ips: Vec<IpRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpRecord {
    pub ip: String,
    /// Per-protocol service banners. Kept loosely typed since providers vary.
    #[serde(default)]
    pub banners: HashMap<String, serde_json::Value>,
}

impl IpRecord {
    fn banner_title(&self, protocol: &str) -> Option<&str> {
        self.banners.get(protocol)?.get("title")?.as_str()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CnameRecord {
    pub host: String,
}

/// Normalizes a DNS dataset into subdomains, IP addresses and likely API endpoints.
///
/// No dataset means no findings.
pub fn analyze_dns_data(dataset: Option<&DnsDataset>) -> DnsFindings {
    let mut findings = DnsFindings::default();
    let Some(dataset) = dataset else {
        return findings;
    };

    for record in &dataset.a {
        findings.subdomains.insert(record.host.clone());
        for ip_info in &record.ips {
            findings.ip_addresses.insert(ip_info.ip.clone());
            for protocol in BANNER_PROTOCOLS {
                if let Some(title) = ip_info.banner_title(protocol) {
                    if title.to_lowercase().contains("api") {
                        debug!(ip = %ip_info.ip, protocol, title, "Banner hints at an API.");
                        findings.potential_apis.insert(format!("{}://{}", protocol, ip_info.ip));
                    }
                }
            }
        }
    }

    for record in &dataset.cname {
        findings.subdomains.insert(record.host.clone());
    }

    findings
}

/// Source of passive DNS datasets.
#[async_trait]
pub trait DnsDatasetSource: Send + Sync {
    /// Returns `None` whenever the provider has nothing usable.
    async fn fetch_dataset(&self, domain: &str) -> Option<DnsDataset>;
}

/// DNSDumpster REST client.
pub struct DnsDumpsterClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DnsDumpsterClient {
    pub fn new(client: reqwest::Client, api_key: &str) -> Self {
        Self::with_base_url(client, api_key, DNSDUMPSTER_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, api_key: &str, base_url: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DnsDatasetSource for DnsDumpsterClient {
    async fn fetch_dataset(&self, domain: &str) -> Option<DnsDataset> {
        let url = format!("{}/domain/{}", self.base_url, domain);
        debug!(%url, "Querying DNS dataset.");

        let response = match self.client.get(&url).header("X-API-Key", &self.api_key).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "DNS dataset request failed.");
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!(%url, status = %response.status(), "DNS dataset provider returned no data.");
            return None;
        }

        match response.json::<DnsDataset>().await {
            Ok(dataset) => Some(dataset),
            Err(e) => {
                warn!(%url, error = %e, "DNS dataset body could not be parsed.");
                None
            }
        }
    }
}

// --- Stage entry point ---

/// Runs active resolution and, when a source is configured, the passive dataset lookup.
pub async fn run_dns_scan(
    resolver: &dyn NameResolver,
    source: Option<&dyn DnsDatasetSource>,
    domain: &str,
) -> DnsResults {
    info!(target = %domain, "Starting DNS enumeration.");

    let passive = async {
        match source {
            Some(source) => Some(source.fetch_dataset(domain).await),
            None => None,
        }
    };
    let (resolved_subdomains, dataset) = tokio::join!(discover_subdomains(resolver, domain), passive);

    let source_configured = dataset.is_some();
    let findings = dataset.flatten().map(|d| analyze_dns_data(Some(&d)));

    let mut results = DnsResults {
        resolved_subdomains,
        dataset: Ok(findings),
        analysis: Vec::new(),
    };
    results.analysis = analyze_dns_results(&results, source_configured);
    info!(findings = %results.analysis.len(), "DNS enumeration finished.");
    results
}

fn analyze_dns_results(results: &DnsResults, source_configured: bool) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();

    for host in &results.resolved_subdomains {
        analyses.push(AnalysisFinding::about(Severity::Info, "DNS_SUBDOMAIN_RESOLVED", host));
    }

    match &results.dataset {
        Ok(Some(findings)) => {
            for api in &findings.potential_apis {
                analyses.push(AnalysisFinding::about(Severity::Warning, "DNS_POTENTIAL_API", api));
            }
        }
        Ok(None) if source_configured => {
            analyses.push(AnalysisFinding::new(Severity::Info, "DNS_DATASET_UNAVAILABLE"));
        }
        Ok(None) => {
            analyses.push(AnalysisFinding::new(Severity::Info, "DNS_DATASET_SKIPPED"));
        }
        Err(_) => {}
    }

    analyses
}
