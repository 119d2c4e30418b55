// src/core/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{AsRefStr, Display, EnumString};

// --- Reusable Result Types ---

// Outcome of one isolated pipeline stage.
// `Ok(None)` means the stage was skipped or had no data, `Err` carries the
// reason the stage failed without aborting the rest of the run.
pub type ScanResult<T> = Result<Option<T>, String>;

// --- Core Data Models ---

// Severity level of a finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

// An analysis finding: a severity level and a code resolved through the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisFinding {
    pub severity: Severity,
    pub code: String,
    /// The artifact the finding is about (a URL, a host, an event id).
    pub subject: Option<String>,
}

impl AnalysisFinding {
    pub fn new(severity: Severity, code: &str) -> Self {
        Self { severity, code: code.to_string(), subject: None }
    }

    pub fn about(severity: Severity, code: &str, subject: impl Into<String>) -> Self {
        Self { severity, code: code.to_string(), subject: Some(subject.into()) }
    }
}

// --- Target Models ---

/// The four indicator types understood by the threat-intel collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum TargetKind {
    #[strum(serialize = "ip-dst")]
    #[serde(rename = "ip-dst")]
    IpDst,
    #[strum(serialize = "domain")]
    #[serde(rename = "domain")]
    Domain,
    #[strum(serialize = "email")]
    #[serde(rename = "email")]
    Email,
    #[strum(serialize = "url")]
    #[serde(rename = "url")]
    Url,
}

/// A classified, immutable user-supplied target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// The string exactly as the user supplied it.
    pub raw: String,
    pub kind: TargetKind,
    /// Probe-able form of the target, always carrying a scheme.
    pub url: String,
    /// Host used for DNS enumeration and virtual host fuzzing.
    pub domain: String,
}

// --- Probe Models ---

/// Network-level failure of a probe, kept apart from any HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ProbeFailure {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<ProbeFailure>,
}

impl ProbeResult {
    pub fn answered(url: &str, status: u16, latency_ms: u64) -> Self {
        Self { url: url.to_string(), status: Some(status), latency_ms, error: None }
    }

    pub fn failed(url: &str, failure: ProbeFailure, latency_ms: u64) -> Self {
        Self { url: url.to_string(), status: None, latency_ms, error: Some(failure) }
    }

    pub fn reachable(&self) -> bool {
        self.status.is_some()
    }

    /// True for any 2xx answer.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

// --- DNS Models ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsFindings {
    pub subdomains: BTreeSet<String>,
    pub ip_addresses: BTreeSet<String>,
    pub potential_apis: BTreeSet<String>,
}

impl DnsFindings {
    pub fn is_empty(&self) -> bool {
        self.subdomains.is_empty() && self.ip_addresses.is_empty() && self.potential_apis.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsResults {
    /// Candidate subdomains that resolved to at least one A record, in candidate order.
    pub resolved_subdomains: Vec<String>,
    pub dataset: ScanResult<DnsFindings>,
    pub analysis: Vec<AnalysisFinding>,
}

impl Default for DnsResults {
    fn default() -> Self {
        Self {
            resolved_subdomains: Vec::new(),
            dataset: Ok(None),
            analysis: Vec::new(),
        }
    }
}

// --- Threat Intelligence Models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatMatch {
    pub event_id: String,
    pub threat_level: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIntelResults {
    pub matches: ScanResult<Vec<ThreatMatch>>,
    pub analysis: Vec<AnalysisFinding>,
}

impl Default for ThreatIntelResults {
    fn default() -> Self {
        Self { matches: Ok(None), analysis: Vec::new() }
    }
}

// --- Fuzzer Models ---

/// Discovered URLs in candidate-list order.
pub type FuzzResult = Vec<String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuzzResults {
    pub vhosts: FuzzResult,
    pub api_endpoints: FuzzResult,
    pub parameters: FuzzResult,
    pub analysis: Vec<AnalysisFinding>,
}

// --- Liveness Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResults {
    /// The URL actually probed, after any trailing `404/` was removed.
    pub checked_url: String,
    pub probe: Option<ProbeResult>,
    /// Every URL the recovery sweeps found, in candidate order.
    pub recovery_candidates: FuzzResult,
    pub final_url: String,
    pub analysis: Vec<AnalysisFinding>,
}

// --- Classification Models ---

/// Ordered feature entries matching the classifier's training schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub entries: Vec<(String, i64)>,
}

impl FeatureVector {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> Vec<i64> {
        self.entries.iter().map(|(_, value)| *value).collect()
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Malicious,
    Safe,
    /// The model produced a label that is neither the true nor the false class.
    Unknown,
}

impl Verdict {
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Malicious => "This website might be malicious!",
            Verdict::Safe => "Website is safe to proceed!",
            Verdict::Unknown => "",
        }
    }

    pub fn is_malicious(&self) -> bool {
        matches!(self, Verdict::Malicious)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResults {
    pub input_features: Option<FeatureVector>,
    pub final_features: Option<FeatureVector>,
    pub verdict: ScanResult<Verdict>,
    pub analysis: Vec<AnalysisFinding>,
}

impl Default for ClassificationResults {
    fn default() -> Self {
        Self {
            input_features: None,
            final_features: None,
            verdict: Ok(None),
            analysis: Vec::new(),
        }
    }
}

// --- Login Models ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: &str, password: &str) -> Self {
        Self { username: username.to_string(), password: password.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResults {
    pub accepted: ScanResult<Credential>,
    pub attempts: usize,
    pub analysis: Vec<AnalysisFinding>,
}

impl Default for LoginResults {
    fn default() -> Self {
        Self { accepted: Ok(None), attempts: 0, analysis: Vec::new() }
    }
}

// --- Main Report ---

// Everything one run accumulated. Each stage fills its own section; a failed
// stage leaves its defaults behind and records the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: Target,
    pub dns_results: DnsResults,
    pub threat_intel_results: ThreatIntelResults,
    pub fuzz_results: FuzzResults,
    pub liveness_results: Option<LivenessResults>,
    pub classification_results: ClassificationResults,
    pub login_results: LoginResults,
}

impl ScanReport {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            dns_results: DnsResults::default(),
            threat_intel_results: ThreatIntelResults::default(),
            fuzz_results: FuzzResults::default(),
            liveness_results: None,
            classification_results: ClassificationResults::default(),
            login_results: LoginResults::default(),
        }
    }

    /// All analysis findings across stages, most severe first.
    pub fn all_findings(&self) -> Vec<&AnalysisFinding> {
        let mut findings: Vec<&AnalysisFinding> = self
            .dns_results
            .analysis
            .iter()
            .chain(self.threat_intel_results.analysis.iter())
            .chain(self.fuzz_results.analysis.iter())
            .chain(self.liveness_results.iter().flat_map(|l| l.analysis.iter()))
            .chain(self.classification_results.analysis.iter())
            .chain(self.login_results.analysis.iter())
            .collect();
        findings.sort_by_key(|f| f.severity);
        findings
    }
}
