// src/core/scanner/threat_intel.rs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::models::{AnalysisFinding, Severity, Target, TargetKind, ThreatIntelResults, ThreatMatch};

/// Indicator lookup against a threat-intelligence service.
#[async_trait]
pub trait ThreatIntel: Send + Sync {
    async fn search(&self, value: &str, kind: TargetKind) -> Result<Vec<ThreatMatch>, String>;
}

/// Client for the MISP attribute search REST endpoint.
pub struct MispClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MispClient {
    pub fn new(base_url: &str, api_key: &str, verify_tls: bool, timeout: Duration) -> Result<Self, reqwest::Error> {
        if !verify_tls {
            warn!(base_url, "TLS certificate verification is disabled for the MISP client.");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RestSearchResponse {
    #[serde(default)]
    response: RestSearchBody,
}

#[derive(Debug, Default, Deserialize)]
struct RestSearchBody {
    #[serde(rename = "Attribute", default)]
    attributes: Vec<MispAttribute>,
}

#[derive(Debug, Deserialize)]
struct MispAttribute {
    #[serde(rename = "Event")]
    event: Option<MispEvent>,
}

#[derive(Debug, Deserialize)]
struct MispEvent {
    id: Value,
    #[serde(default)]
    threat_level_id: Value,
    info: Option<String>,
}

// MISP serializes ids as strings, but some deployments send numbers.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "unknown".to_string(),
        other => other.to_string(),
    }
}

/// Extracts the matches that carry an event from a restSearch body.
fn parse_matches(body: &str) -> Result<Vec<ThreatMatch>, String> {
    let parsed: RestSearchResponse =
        serde_json::from_str(body).map_err(|e| format!("Unexpected MISP response: {}", e))?;
    Ok(parsed
        .response
        .attributes
        .into_iter()
        .filter_map(|attribute| attribute.event)
        .map(|event| ThreatMatch {
            event_id: scalar_to_string(&event.id),
            threat_level: scalar_to_string(&event.threat_level_id),
            description: event.info.unwrap_or_else(|| "No description available".to_string()),
        })
        .collect())
}

#[async_trait]
impl ThreatIntel for MispClient {
    async fn search(&self, value: &str, kind: TargetKind) -> Result<Vec<ThreatMatch>, String> {
        let url = format!("{}/attributes/restSearch", self.base_url);
        debug!(%url, value, kind = %kind, "Searching MISP attributes.");

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.api_key)
            .header("Accept", "application/json")
            .json(&json!({ "value": value, "type": kind.as_ref() }))
            .send()
            .await
            .map_err(|e| format!("MISP request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("MISP returned HTTP {}", status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read MISP response: {}", e))?;
        parse_matches(&body)
    }
}

/// Looks the raw target up in the threat-intel service, if one is configured.
pub async fn run_threat_intel_check(intel: Option<&dyn ThreatIntel>, target: &Target) -> ThreatIntelResults {
    let Some(intel) = intel else {
        info!("No threat-intel service configured, skipping check.");
        let mut results = ThreatIntelResults::default();
        results.analysis = analyze_threat_intel_results(&results);
        return results;
    };

    info!(value = %target.raw, kind = %target.kind, "Checking threat-intel database.");
    let matches = match intel.search(&target.raw, target.kind).await {
        Ok(matches) => {
            info!(count = matches.len(), "Threat-intel lookup finished.");
            Ok(Some(matches))
        }
        Err(e) => {
            error!(error = %e, "Threat-intel lookup failed.");
            Err(e)
        }
    };

    let mut results = ThreatIntelResults { matches, analysis: Vec::new() };
    results.analysis = analyze_threat_intel_results(&results);
    results
}

fn analyze_threat_intel_results(results: &ThreatIntelResults) -> Vec<AnalysisFinding> {
    match &results.matches {
        Ok(Some(matches)) if matches.is_empty() => {
            vec![AnalysisFinding::new(Severity::Info, "THREAT_INTEL_CLEAN")]
        }
        Ok(Some(matches)) => matches
            .iter()
            .map(|m| AnalysisFinding::about(Severity::Critical, "THREAT_INTEL_MATCH", format!("event {}", m.event_id)))
            .collect(),
        Ok(None) => vec![AnalysisFinding::new(Severity::Info, "THREAT_INTEL_SKIPPED")],
        Err(_) => vec![AnalysisFinding::new(Severity::Warning, "THREAT_INTEL_FAILED")],
    }
}
