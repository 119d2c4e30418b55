//! Static catalogue of every finding the engine can report.
//!
//! Stages only emit machine-readable codes; this module turns a code into a
//! title, a category and an explanation for the report.

use crate::core::models::Severity;
use std::fmt;

/// Groups findings by the pipeline stage that produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingCategory {
    Dns,
    ThreatIntel,
    Fuzzing,
    Liveness,
    Classification,
    Login,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Dns => write!(f, "DNS Enumeration"),
            FindingCategory::ThreatIntel => write!(f, "Threat Intelligence"),
            FindingCategory::Fuzzing => write!(f, "Endpoint Fuzzing"),
            FindingCategory::Liveness => write!(f, "Liveness"),
            FindingCategory::Classification => write!(f, "Phishing Classification"),
            FindingCategory::Login => write!(f, "Login Probe"),
        }
    }
}

/// Human-readable information about one finding code.
pub struct FindingDetail {
    /// Machine-readable identifier, e.g. "DNS_POTENTIAL_API".
    pub code: &'static str,
    pub title: &'static str,
    pub category: FindingCategory,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- DNS ---
    FindingDetail {
        code: "DNS_SUBDOMAIN_RESOLVED",
        title: "Common Subdomain Resolves",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "A well-known subdomain label resolves to an address. Every resolvable host widens the attack surface that has to be maintained.",
        remediation: "Confirm the host is intended to be public and remove stale DNS records for retired services."
    },
    FindingDetail {
        code: "DNS_POTENTIAL_API",
        title: "API Advertised by Service Banner",
        category: FindingCategory::Dns,
        severity: Severity::Warning,
        description: "An HTTP(S) service banner on one of the domain's addresses mentions an API. Directly addressable API hosts often skip the protections placed in front of the main site.",
        remediation: "Put the API behind the same gateway, authentication and rate limiting as the rest of the application, or restrict it to the networks that need it."
    },
    FindingDetail {
        code: "DNS_DATASET_UNAVAILABLE",
        title: "DNS Dataset Unavailable",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "The passive DNS provider returned no data for this domain, so only active resolution results are shown.",
        remediation: "Check the provider API key and quota, then run the scan again."
    },
    FindingDetail {
        code: "DNS_DATASET_SKIPPED",
        title: "DNS Dataset Not Configured",
        category: FindingCategory::Dns,
        severity: Severity::Info,
        description: "No API key for the passive DNS provider is configured, so host, IP and banner records were not collected.",
        remediation: "Set WEBGUARD_DNSDUMPSTER_API_KEY or add 'dnsdumpster_api_key' to the configuration file."
    },

    // --- Threat intelligence ---
    FindingDetail {
        code: "THREAT_INTEL_MATCH",
        title: "Indicator Found in Threat Intelligence",
        category: FindingCategory::ThreatIntel,
        severity: Severity::Critical,
        description: "The target matches an attribute of a known threat event. It has been reported as part of malicious activity.",
        remediation: "Review the referenced event before interacting with the target and block the indicator if it is confirmed."
    },
    FindingDetail {
        code: "THREAT_INTEL_CLEAN",
        title: "No Threat Intelligence Matches",
        category: FindingCategory::ThreatIntel,
        severity: Severity::Info,
        description: "The threat-intelligence database has no attribute matching the target.",
        remediation: "No action required. Absence from the database is not proof of safety."
    },
    FindingDetail {
        code: "THREAT_INTEL_SKIPPED",
        title: "Threat Intelligence Not Configured",
        category: FindingCategory::ThreatIntel,
        severity: Severity::Info,
        description: "No threat-intelligence service URL and key are configured, so the lookup was skipped.",
        remediation: "Set WEBGUARD_MISP_URL and WEBGUARD_MISP_API_KEY to enable the lookup."
    },
    FindingDetail {
        code: "THREAT_INTEL_FAILED",
        title: "Threat Intelligence Lookup Failed",
        category: FindingCategory::ThreatIntel,
        severity: Severity::Warning,
        description: "The threat-intelligence service could not be queried. The rest of the report is unaffected.",
        remediation: "Verify the service URL, API key and network reachability."
    },

    // --- Fuzzing ---
    FindingDetail {
        code: "FUZZ_VHOST_FOUND",
        title: "Virtual Host Answers",
        category: FindingCategory::Fuzzing,
        severity: Severity::Info,
        description: "A common virtual host under the target domain serves a successful response.",
        remediation: "Make sure every virtual host is inventoried, patched and intended to be reachable."
    },
    FindingDetail {
        code: "FUZZ_API_ENDPOINT_FOUND",
        title: "API Endpoint Reachable",
        category: FindingCategory::Fuzzing,
        severity: Severity::Warning,
        description: "A well-known API path answers with a success status without any credentials.",
        remediation: "Require authentication on API routes and avoid exposing administrative prefixes publicly."
    },
    FindingDetail {
        code: "FUZZ_PARAMETER_ACCEPTED",
        title: "Injection Payload Accepted",
        category: FindingCategory::Fuzzing,
        severity: Severity::Warning,
        description: "A request carrying an injection-style payload in a query parameter was answered with a success status. This only shows the request was not blocked; it does not prove the injection worked.",
        remediation: "Validate and encode all parameters server-side and consider a WAF rule for obvious injection payloads."
    },

    // --- Liveness ---
    FindingDetail {
        code: "LIVENESS_404_STRIPPED",
        title: "Trailing 404 Segment Removed",
        category: FindingCategory::Liveness,
        severity: Severity::Info,
        description: "The URL ended in '404/'. The segment was removed before checking whether the site is live.",
        remediation: "No action required."
    },
    FindingDetail {
        code: "LIVENESS_OK",
        title: "Website Is Live",
        category: FindingCategory::Liveness,
        severity: Severity::Info,
        description: "The URL answered with 200 (OK).",
        remediation: "No action required."
    },
    FindingDetail {
        code: "LIVENESS_NOT_OK",
        title: "Website May Have Issues",
        category: FindingCategory::Liveness,
        severity: Severity::Warning,
        description: "The URL answered, but not with 200 (OK). A path brute-force was attempted to find a working page.",
        remediation: "Check the URL for typos, or look at the recovered URL reported below."
    },
    FindingDetail {
        code: "LIVENESS_UNREACHABLE",
        title: "Website Unreachable",
        category: FindingCategory::Liveness,
        severity: Severity::Warning,
        description: "The URL could not be reached at all: the request timed out, the name did not resolve, or the connection was refused.",
        remediation: "Verify the host is online and reachable from this network."
    },
    FindingDetail {
        code: "LIVENESS_RECOVERED",
        title: "Working URL Recovered",
        category: FindingCategory::Liveness,
        severity: Severity::Info,
        description: "A path brute-force found a reachable URL on the same site. It is used for classification instead of the original one.",
        remediation: "No action required."
    },
    FindingDetail {
        code: "LIVENESS_NOT_RECOVERED",
        title: "No Working URL Found",
        category: FindingCategory::Liveness,
        severity: Severity::Info,
        description: "None of the brute-forced paths answered, so the original URL is classified as-is.",
        remediation: "No action required."
    },

    // --- Classification ---
    FindingDetail {
        code: "CLASSIFIER_MALICIOUS",
        title: "URL Classified as Phishing",
        category: FindingCategory::Classification,
        severity: Severity::Critical,
        description: "The phishing URL detector considers the URL's structure typical of malicious sites.",
        remediation: "Do not enter credentials or personal data on this site. Report it if it impersonates a known brand."
    },
    FindingDetail {
        code: "CLASSIFIER_SAFE",
        title: "URL Classified as Benign",
        category: FindingCategory::Classification,
        severity: Severity::Info,
        description: "The phishing URL detector found nothing typical of malicious sites in the URL's structure.",
        remediation: "No action required."
    },
    FindingDetail {
        code: "CLASSIFIER_UNKNOWN",
        title: "Classifier Output Not Recognized",
        category: FindingCategory::Classification,
        severity: Severity::Warning,
        description: "The model returned a label that is neither the malicious nor the benign class.",
        remediation: "Check that the model artifact was exported with boolean or 0/1 class labels."
    },
    FindingDetail {
        code: "CLASSIFIER_FAILED",
        title: "Unable to Classify",
        category: FindingCategory::Classification,
        severity: Severity::Warning,
        description: "The URL could not be classified. The rest of the report is unaffected.",
        remediation: "Check that the model artifact matches the feature schema of this version."
    },

    // --- Login ---
    FindingDetail {
        code: "LOGIN_WEAK_CREDENTIALS",
        title: "Weak Credentials Accepted",
        category: FindingCategory::Login,
        severity: Severity::Critical,
        description: "The login form accepted a username and password from a short list of common defaults.",
        remediation: "Change the password immediately, enforce a password policy and add rate limiting or lockout to the login form."
    },
    FindingDetail {
        code: "LOGIN_NO_WEAK_CREDENTIALS",
        title: "No Weak Credentials Accepted",
        category: FindingCategory::Login,
        severity: Severity::Info,
        description: "None of the tried credential pairs were accepted.",
        remediation: "No action required."
    },
];

/// Looks up the detail for a finding code.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}
