// src/core/features.rs

use async_trait::async_trait;
use chrono::DateTime;
use hickory_resolver::TokioAsyncResolver;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::core::models::FeatureVector;

/// Feature names in the exact column order the classifier was trained on.
pub const FEATURE_SCHEMA: &[&str] = &[
    "length_url",
    "domain_length",
    "domain_in_ip",
    "directory_length",
    "file_length",
    "params_length",
    "email_in_url",
    "asn_ip",
    "time_domain_activation",
    "time_domain_expiration",
    "tls_ssl_certificate",
    "qty_redirects",
    "qty_char_domain",
];

/// Value used for every feature that could not be computed.
pub const MISSING_FEATURE: i64 = -1;

pub const MAX_REDIRECTS: i64 = 20;

pub const RDAP_BASE_URL: &str = "https://rdap.org";

const DOMAIN_SIGNS: &[char] = &['.', '-', '_', '/', '?', '=', '@', '&', '!', ' ', '~', ',', '+', '*', '#', '$', '%'];

static RE_EMAIL_IN_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w\-.]+@[\w\-.]+\.\w+").unwrap());

/// Feature values before integer coercion; `None` marks a feature that could not be computed.
pub type RawFeatures = HashMap<&'static str, Option<f64>>;

/// The structural pieces of a URL the lexical features are computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    /// Everything between `//` and the path, port and userinfo included.
    pub domain: String,
    pub directory: String,
    pub file: String,
    pub query: Option<String>,
}

impl UrlParts {
    /// Host without userinfo or port.
    pub fn host(&self) -> &str {
        let without_user = self.domain.rsplit('@').next().unwrap_or(&self.domain);
        without_user.split(':').next().unwrap_or(without_user)
    }
}

/// Byte offset where the network location starts: after a leading `//`, or
/// after the `//` that directly follows a scheme.
fn network_location_start(url: &str) -> Option<usize> {
    if url.starts_with("//") {
        return Some(2);
    }
    let (scheme, rest) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    (valid_scheme && rest.starts_with("//")).then_some(scheme.len() + 3)
}

/// Splits a URL into domain, directory, file and query.
///
/// Inputs without any `//` are treated as starting with the network
/// location. A `//` anywhere else is part of the path, leaving the domain empty.
pub fn parse_url(url: &str) -> UrlParts {
    let (has_domain, after_scheme) = match network_location_start(url) {
        Some(i) => (true, &url[i..]),
        None if !url.contains("//") => (true, url),
        None => (false, url),
    };
    let without_fragment = after_scheme.split('#').next().unwrap_or(after_scheme);
    let (rest, query) = match without_fragment.split_once('?') {
        Some((rest, query)) => (rest, Some(query.to_string())),
        None => (without_fragment, None),
    };
    let (domain, path) = match rest.find('/') {
        _ if !has_domain => ("", rest),
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };

    let (directory, file) = match path.rsplit_once('/') {
        Some((directory, file)) => (directory.to_string(), file.to_string()),
        None if path.contains('.') => (String::new(), path.to_string()),
        None => (path.to_string(), String::new()),
    };

    UrlParts {
        domain: domain.to_string(),
        directory,
        file,
        query: query.filter(|q| !q.is_empty()),
    }
}

fn flag(value: bool) -> Option<f64> {
    Some(if value { 1.0 } else { 0.0 })
}

/// Computes every feature that needs nothing but the URL string.
///
/// Network-derived features are present but `None`.
pub fn lexical_features(url: &str) -> RawFeatures {
    let parts = parse_url(url);
    let mut features = RawFeatures::new();

    features.insert("length_url", Some(url.chars().count() as f64));
    features.insert("domain_length", Some(parts.domain.chars().count() as f64));
    features.insert("domain_in_ip", flag(parts.host().parse::<Ipv4Addr>().is_ok()));
    features.insert("directory_length", Some(parts.directory.chars().count() as f64));
    features.insert("file_length", Some(parts.file.chars().count() as f64));
    features.insert("params_length", parts.query.as_ref().map(|q| q.chars().count() as f64));
    features.insert("email_in_url", flag(RE_EMAIL_IN_URL.is_match(url)));
    features.insert("tls_ssl_certificate", flag(url.starts_with("https")));
    features.insert(
        "qty_char_domain",
        Some(parts.domain.chars().filter(|c| DOMAIN_SIGNS.contains(c)).count() as f64),
    );

    features.insert("asn_ip", None);
    features.insert("time_domain_activation", None);
    features.insert("time_domain_expiration", None);
    features.insert("qty_redirects", None);
    features
}

/// Lays raw features out in schema order, replacing anything missing with `-1`
/// and truncating the rest to integers.
pub fn to_feature_vector(raw: &RawFeatures) -> FeatureVector {
    let entries = FEATURE_SCHEMA
        .iter()
        .map(|name| {
            let value = raw
                .get(name)
                .copied()
                .flatten()
                .filter(|v| v.is_finite())
                .map(|v| v as i64)
                .unwrap_or(MISSING_FEATURE);
            (name.to_string(), value)
        })
        .collect();
    FeatureVector { entries }
}

// --- Network enrichment ---

/// Lookups behind the features that need the network.
#[async_trait]
pub trait DomainIntel: Send + Sync {
    /// Registration and expiration time of `domain`, in epoch seconds.
    async fn registration_window(&self, domain: &str) -> Option<(i64, i64)>;
    /// Origin AS number of the first IPv4 address of `host`.
    async fn origin_asn(&self, host: &str) -> Option<i64>;
    /// Number of 301/302 hops before `url` settles.
    async fn count_redirects(&self, url: &str) -> Option<i64>;
}

/// RDAP, Team Cymru DNS and plain HTTP backed enrichment.
pub struct NetworkIntel {
    client: reqwest::Client,
    resolver: TokioAsyncResolver,
    rdap_base: String,
}

#[derive(Debug, Deserialize)]
struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    action: String,
    #[serde(rename = "eventDate")]
    date: String,
}

impl NetworkIntel {
    pub fn new(resolver: TokioAsyncResolver, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(crate::core::scanner::probe::USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client, resolver, rdap_base: RDAP_BASE_URL.to_string() })
    }

    async fn first_ipv4(&self, host: &str) -> Option<Ipv4Addr> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Some(ip);
        }
        let lookup = self.resolver.ipv4_lookup(host).await.ok()?;
        lookup.iter().next().map(|a| a.0)
    }
}

fn event_timestamp(events: &[RdapEvent], action: &str) -> Option<i64> {
    let event = events.iter().find(|e| e.action == action)?;
    DateTime::parse_from_rfc3339(&event.date).ok().map(|d| d.timestamp())
}

/// Parses the AS number out of a Cymru origin record such as `"15169 | 8.8.8.0/24 | US | arin | 1992-12-01"`.
fn parse_cymru_asn(record: &str) -> Option<i64> {
    record
        .trim_matches('"')
        .split('|')
        .next()?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

#[async_trait]
impl DomainIntel for NetworkIntel {
    async fn registration_window(&self, domain: &str) -> Option<(i64, i64)> {
        let domain = domain.strip_prefix("www.").unwrap_or(domain);
        let url = format!("{}/domain/{}", self.rdap_base, domain);
        // rdap.org answers with a redirect to the authoritative registry.
        let mut response = self.client.get(&url).send().await.ok()?;
        if response.status().is_redirection() {
            let location = response.headers().get(reqwest::header::LOCATION)?.to_str().ok()?.to_string();
            response = self.client.get(&location).send().await.ok()?;
        }
        if !response.status().is_success() {
            debug!(domain, status = %response.status(), "RDAP lookup returned no record.");
            return None;
        }
        let record: RdapDomain = response.json().await.ok()?;
        let created = event_timestamp(&record.events, "registration")?;
        let expires = event_timestamp(&record.events, "expiration")?;
        Some((created, expires))
    }

    async fn origin_asn(&self, host: &str) -> Option<i64> {
        let ip = self.first_ipv4(host).await?;
        let [a, b, c, d] = ip.octets();
        let query = format!("{}.{}.{}.{}.origin.asn.cymru.com.", d, c, b, a);
        let records = self.resolver.txt_lookup(query).await.ok()?;
        records.iter().find_map(|r| parse_cymru_asn(&r.to_string()))
    }

    async fn count_redirects(&self, url: &str) -> Option<i64> {
        let mut current = Url::parse(url).ok()?;
        let mut hops = 0;
        loop {
            let response = self.client.get(current.clone()).send().await.ok()?;
            let status = response.status().as_u16();
            if status != 301 && status != 302 {
                break;
            }
            let location = response.headers().get(reqwest::header::LOCATION)?.to_str().ok()?;
            current = current.join(location).ok()?;
            hops += 1;
            if hops >= MAX_REDIRECTS {
                break;
            }
        }
        Some(hops)
    }
}

// --- Extractor ---

/// Turns URLs into classifier input, optionally enriched from the network.
///
/// Vectors are cached per URL until [`FeatureExtractor::invalidate`] is called.
pub struct FeatureExtractor {
    intel: Option<Arc<dyn DomainIntel>>,
    cache: Mutex<HashMap<String, FeatureVector>>,
}

impl FeatureExtractor {
    /// Lexical features only; network features stay at `-1`.
    pub fn lexical() -> Self {
        Self { intel: None, cache: Mutex::new(HashMap::new()) }
    }

    pub fn with_intel(intel: Arc<dyn DomainIntel>) -> Self {
        Self { intel: Some(intel), cache: Mutex::new(HashMap::new()) }
    }

    /// Drops every cached vector.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            debug!(entries = cache.len(), "Invalidating feature cache.");
            cache.clear();
        }
    }

    pub async fn url_to_features(&self, url: &str) -> FeatureVector {
        if let Some(cached) = self.cache.lock().ok().and_then(|c| c.get(url).cloned()) {
            debug!(url, "Feature vector served from cache.");
            return cached;
        }

        let mut raw = lexical_features(url);
        if let Some(intel) = &self.intel {
            let parts = parse_url(url);
            let host = parts.host().to_string();
            let (window, asn, redirects) = tokio::join!(
                intel.registration_window(&host),
                intel.origin_asn(&host),
                intel.count_redirects(url)
            );
            if window.is_none() {
                warn!(host = %host, "Domain registration data unavailable.");
            }
            raw.insert("time_domain_activation", window.map(|(created, _)| created as f64));
            raw.insert("time_domain_expiration", window.map(|(_, expires)| expires as f64));
            raw.insert("asn_ip", asn.map(|v| v as f64));
            raw.insert("qty_redirects", redirects.map(|v| v as f64));
        }

        let vector = to_feature_vector(&raw);
        debug!(url, features = ?vector.values(), "Features extracted.");
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), vector.clone());
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_url_components() {
        let parts = parse_url("https://www.example.com/a/b/login.php?user=1&x=2#frag");
        assert_eq!(parts.domain, "www.example.com");
        assert_eq!(parts.directory, "/a/b");
        assert_eq!(parts.file, "login.php");
        assert_eq!(parts.query.as_deref(), Some("user=1&x=2"));
    }

    #[test]
    fn test_parse_url_without_scheme() {
        let parts = parse_url("example.com");
        assert_eq!(parts.domain, "example.com");
        assert_eq!(parts.directory, "");
        assert_eq!(parts.file, "");
        assert!(parts.query.is_none());
    }

    #[test]
    fn test_inner_double_slash_is_path() {
        let parts = parse_url("example.com/a//b");
        assert_eq!(parts.domain, "");
        assert_eq!(parts.directory, "example.com/a/");
        assert_eq!(parts.file, "b");

        assert_eq!(parse_url("//cdn.example.com/x.js").domain, "cdn.example.com");
        assert_eq!(parse_url("svn+ssh://host.example/repo").domain, "host.example");
    }

    #[test]
    fn test_host_strips_port_and_userinfo() {
        let parts = parse_url("http://bob@10.0.0.1:8080/");
        assert_eq!(parts.domain, "bob@10.0.0.1:8080");
        assert_eq!(parts.host(), "10.0.0.1");
    }

    #[test]
    fn test_lexical_values() {
        let vector = to_feature_vector(&lexical_features("https://my-site.example.com/dir/index.html"));
        assert_eq!(vector.get("length_url"), Some(42));
        assert_eq!(vector.get("domain_length"), Some(19));
        assert_eq!(vector.get("domain_in_ip"), Some(0));
        assert_eq!(vector.get("directory_length"), Some(4));
        assert_eq!(vector.get("file_length"), Some(10));
        assert_eq!(vector.get("params_length"), Some(MISSING_FEATURE));
        assert_eq!(vector.get("email_in_url"), Some(0));
        assert_eq!(vector.get("tls_ssl_certificate"), Some(1));
        // two dots and one hyphen
        assert_eq!(vector.get("qty_char_domain"), Some(3));
    }

    #[test]
    fn test_ip_host_and_email_flags() {
        let vector = to_feature_vector(&lexical_features("http://192.168.0.10/login?to=admin@corp.example.com"));
        assert_eq!(vector.get("domain_in_ip"), Some(1));
        assert_eq!(vector.get("email_in_url"), Some(1));
        assert_eq!(vector.get("tls_ssl_certificate"), Some(0));
        assert_eq!(vector.get("params_length"), Some(25));
    }

    #[test]
    fn test_vector_is_complete_and_ordered() {
        for url in ["", "http://", "example.com", "https://a.b/c?d=e", "not a url at all"] {
            let vector = to_feature_vector(&lexical_features(url));
            let names: Vec<&str> = vector.names().collect();
            assert_eq!(names, FEATURE_SCHEMA, "schema mismatch for {:?}", url);
        }
    }

    #[test]
    fn test_missing_and_non_finite_become_sentinel() {
        let mut raw = RawFeatures::new();
        raw.insert("length_url", Some(12.9));
        raw.insert("asn_ip", Some(f64::NAN));
        let vector = to_feature_vector(&raw);
        assert_eq!(vector.get("length_url"), Some(12));
        assert_eq!(vector.get("asn_ip"), Some(MISSING_FEATURE));
        assert_eq!(vector.get("qty_redirects"), Some(MISSING_FEATURE));
    }

    #[test]
    fn test_cymru_record_parsing() {
        assert_eq!(parse_cymru_asn("\"15169 | 8.8.8.0/24 | US | arin | 1992-12-01\""), Some(15169));
        assert_eq!(parse_cymru_asn("garbage"), None);
    }

    #[test]
    fn test_rdap_event_timestamps() {
        let record: RdapDomain = serde_json::from_str(
            r#"{"events": [{"eventAction": "registration", "eventDate": "1970-01-02T00:00:00Z"},
                           {"eventAction": "expiration", "eventDate": "1970-01-03T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(event_timestamp(&record.events, "registration"), Some(86_400));
        assert_eq!(event_timestamp(&record.events, "expiration"), Some(172_800));
        assert_eq!(event_timestamp(&record.events, "last changed"), None);
    }

    struct CountingIntel(AtomicUsize);

    #[async_trait]
    impl DomainIntel for CountingIntel {
        async fn registration_window(&self, _domain: &str) -> Option<(i64, i64)> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some((1_000, 2_000))
        }
        async fn origin_asn(&self, _host: &str) -> Option<i64> {
            None
        }
        async fn count_redirects(&self, _url: &str) -> Option<i64> {
            Some(2)
        }
    }

    #[tokio::test]
    async fn test_lexical_extractor_leaves_network_features_missing() {
        let vector = FeatureExtractor::lexical().url_to_features("https://example.com/").await;
        for name in ["asn_ip", "time_domain_activation", "time_domain_expiration", "qty_redirects"] {
            assert_eq!(vector.get(name), Some(MISSING_FEATURE));
        }
    }

    #[tokio::test]
    async fn test_enrichment_and_cache_invalidation() {
        let intel = Arc::new(CountingIntel(AtomicUsize::new(0)));
        let extractor = FeatureExtractor::with_intel(intel.clone());

        let first = extractor.url_to_features("https://example.com/").await;
        assert_eq!(first.get("time_domain_activation"), Some(1_000));
        assert_eq!(first.get("time_domain_expiration"), Some(2_000));
        assert_eq!(first.get("asn_ip"), Some(MISSING_FEATURE));
        assert_eq!(first.get("qty_redirects"), Some(2));

        extractor.url_to_features("https://example.com/").await;
        assert_eq!(intel.0.load(Ordering::SeqCst), 1);

        extractor.invalidate();
        extractor.url_to_features("https://example.com/").await;
        assert_eq!(intel.0.load(Ordering::SeqCst), 2);
    }
}
