// src/core/scanner/mod.rs

// Public interface of the `scanner` module: every stage lives in its own
// sub-module, the orchestrator below sequences them.
pub mod dns_scanner;
pub mod fuzz_scanner;
pub mod login_scanner;
pub mod param_scanner;
pub mod probe;
pub mod threat_intel;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use strum::Display;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::classifier::Classifier;
use crate::core::features::{FeatureExtractor, NetworkIntel};
use crate::core::models::{
    AnalysisFinding, ClassificationResults, Credential, FuzzResults, LivenessResults, ScanReport, Severity, Target,
    TargetKind, Verdict,
};
use crate::core::target::classify_target;
use self::dns_scanner::{build_resolver, run_dns_scan, DnsDatasetSource, DnsDumpsterClient, NameResolver};
use self::fuzz_scanner::{brute_force_directories, brute_force_pages, fuzz_virtual_hosts, test_api_endpoints};
use self::login_scanner::{build_login_client, run_login_probe};
use self::param_scanner::fuzz_parameters;
use self::probe::{HttpProbe, Probe, PROBE_TIMEOUT};
use self::threat_intel::{run_threat_intel_check, MispClient, ThreatIntel};

/// Default size of the per-sweep worker pool.
pub const DEFAULT_WORKERS: usize = 8;

/// Pipeline states, in the order a run walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Idle,
    ClassifyingInput,
    EnumeratingDns,
    QueryingThreatIntel,
    Fuzzing,
    CheckingLiveness,
    BruteForcingRecovery,
    ExtractingFeatures,
    ClassifyingUrl,
    ProbingLogin,
    Reporting,
}

/// A login form to try credential pairs against.
#[derive(Debug, Clone)]
pub struct LoginTarget {
    pub url: String,
    pub credentials: Vec<Credential>,
    pub success_marker: String,
}

/// Every collaborator the orchestrator talks to.
///
/// Optional services are `None` when their credentials are not configured,
/// which disables the matching stage.
pub struct Dependencies {
    pub probe: Arc<dyn Probe>,
    pub resolver: Arc<dyn NameResolver>,
    pub dns_dataset: Option<Arc<dyn DnsDatasetSource>>,
    pub threat_intel: Option<Arc<dyn ThreatIntel>>,
    pub classifier: Arc<Classifier>,
    pub extractor: FeatureExtractor,
    /// Keeps cookies across login attempts.
    pub login_client: reqwest::Client,
}

impl Dependencies {
    /// Builds the production collaborators described by `config`.
    pub fn from_config(config: &Config, classifier: Arc<Classifier>) -> Result<Self, reqwest::Error> {
        let probe = HttpProbe::standard()?;
        let login_client = build_login_client()?;
        let resolver = build_resolver(PROBE_TIMEOUT);

        let dns_dataset = match &config.dnsdumpster_api_key {
            Some(key) => {
                Some(Arc::new(DnsDumpsterClient::new(probe.client().clone(), key)) as Arc<dyn DnsDatasetSource>)
            }
            None => {
                warn!("DNS dataset API key not configured; passive enumeration disabled.");
                None
            }
        };

        let threat_intel = match config.misp_credentials() {
            Some((url, key)) => {
                Some(Arc::new(MispClient::new(url, key, config.misp_verify_tls, PROBE_TIMEOUT)?) as Arc<dyn ThreatIntel>)
            }
            None => {
                warn!("Threat-intel URL and key not configured; lookup disabled.");
                None
            }
        };

        let extractor = if config.enrich_features {
            FeatureExtractor::with_intel(Arc::new(NetworkIntel::new(resolver.clone(), PROBE_TIMEOUT)?))
        } else {
            FeatureExtractor::lexical()
        };

        Ok(Self {
            probe: Arc::new(probe),
            resolver: Arc::new(resolver),
            dns_dataset,
            threat_intel,
            classifier,
            extractor,
            login_client,
        })
    }
}

/// Sequences every stage of a run and isolates their failures.
pub struct Orchestrator {
    deps: Dependencies,
    workers: usize,
    login: Option<LoginTarget>,
}

impl Orchestrator {
    /// Creates an orchestrator over a fixed set of collaborators.
    ///
    /// # Arguments
    /// * `deps` - Probe, resolver, optional services, classifier and feature extractor.
    /// * `workers` - Concurrent requests per sweep; `0` is raised to `1`.
    /// * `login` - Login form to try credentials against, if any.
    pub fn new(deps: Dependencies, workers: usize, login: Option<LoginTarget>) -> Self {
        Self { deps, workers: workers.max(1), login }
    }

    fn enter(&self, stage: Stage) {
        info!(stage = %stage, "Entering stage.");
    }

    /// Runs the whole pipeline against `input`.
    ///
    /// Stages run in a fixed order: DNS enumeration, threat intelligence,
    /// fuzzing, liveness with recovery, feature extraction, classification
    /// and the optional login probe. Each stage isolates its own failures.
    ///
    /// # Arguments
    /// * `input` - An IP address, domain, email address or URL.
    ///
    /// # Returns
    /// `None` only for an empty target. Any other run produces a report,
    /// however many stages failed along the way.
    pub async fn run(&self, input: &str) -> Option<ScanReport> {
        if input.trim().is_empty() {
            info!("Empty target, staying idle.");
            return None;
        }

        self.enter(Stage::ClassifyingInput);
        let target = classify_target(input)?;
        info!(target = %target.raw, kind = %target.kind, "Starting scan.");
        let mut report = ScanReport::new(target.clone());

        self.enter(Stage::EnumeratingDns);
        report.dns_results =
            run_dns_scan(self.deps.resolver.as_ref(), self.deps.dns_dataset.as_deref(), &target.domain).await;

        if self.deps.threat_intel.is_some() {
            self.enter(Stage::QueryingThreatIntel);
        }
        report.threat_intel_results = run_threat_intel_check(self.deps.threat_intel.as_deref(), &target).await;

        self.enter(Stage::Fuzzing);
        let potential_apis: Vec<String> = match &report.dns_results.dataset {
            Ok(Some(findings)) => findings.potential_apis.iter().cloned().collect(),
            _ => Vec::new(),
        };
        report.fuzz_results = self.run_fuzzing(&target, &potential_apis).await;

        self.enter(Stage::CheckingLiveness);
        let liveness = self.check_liveness(&target.url).await;
        let final_url = liveness.final_url.clone();
        report.liveness_results = Some(liveness);

        report.classification_results = self.classify(&target.raw, &final_url).await;

        if let Some(login) = &self.login {
            self.enter(Stage::ProbingLogin);
            report.login_results =
                run_login_probe(&self.deps.login_client, &login.url, &login.credentials, &login.success_marker).await;
        }

        self.enter(Stage::Reporting);
        info!(findings = report.all_findings().len(), "Scan finished.");
        self.enter(Stage::Idle);
        Some(report)
    }

    /// Virtual hosts, API prefixes (on the target and every API host from
    /// DNS) and parameter payloads, swept concurrently. The worker bound
    /// applies to each of the three sweeps.
    async fn run_fuzzing(&self, target: &Target, potential_apis: &[String]) -> FuzzResults {
        let probe = self.deps.probe.as_ref();
        let base = target.url.as_str();

        let vhosts = async {
            if target.kind == TargetKind::IpDst {
                Vec::new()
            } else {
                fuzz_virtual_hosts(probe, base, self.workers).await
            }
        };
        let api_bases: Vec<&str> = std::iter::once(base).chain(potential_apis.iter().map(String::as_str)).collect();
        let apis = test_api_endpoints(probe, &api_bases, self.workers);
        let parameters = fuzz_parameters(probe, base, self.workers);

        let (vhosts, api_endpoints, parameters) = tokio::join!(vhosts, apis, parameters);

        let mut results = FuzzResults {
            vhosts,
            api_endpoints,
            parameters,
            analysis: Vec::new(),
        };
        results.analysis = analyze_fuzz_results(&results);
        info!(
            vhosts = results.vhosts.len(),
            api_endpoints = results.api_endpoints.len(),
            parameters = results.parameters.len(),
            "Fuzzing finished."
        );
        results
    }

    /// Probes the target and, when it does not answer 200, brute-forces a
    /// working URL on the same site. The first hit in candidate order wins.
    async fn check_liveness(&self, url: &str) -> LivenessResults {
        let mut analysis = Vec::new();
        let checked_url = match url.strip_suffix("404/") {
            Some(stripped) => {
                info!(original = url, stripped, "Removed trailing '404/'.");
                analysis.push(AnalysisFinding::about(Severity::Info, "LIVENESS_404_STRIPPED", stripped));
                stripped.to_string()
            }
            None => url.to_string(),
        };

        let probe = self.deps.probe.fetch(&checked_url).await;
        if probe.status == Some(200) {
            info!(url = %checked_url, "Website is live.");
            analysis.push(AnalysisFinding::about(Severity::Info, "LIVENESS_OK", checked_url.clone()));
            return LivenessResults {
                final_url: checked_url.clone(),
                checked_url,
                probe: Some(probe),
                recovery_candidates: Vec::new(),
                analysis,
            };
        }

        match (probe.status, &probe.error) {
            (Some(status), _) => {
                warn!(url = %checked_url, status, "Website answered without 200.");
                analysis.push(AnalysisFinding::about(Severity::Warning, "LIVENESS_NOT_OK", format!("HTTP {}", status)));
            }
            (None, failure) => {
                let reason = failure.as_ref().map(|f| f.to_string()).unwrap_or_default();
                warn!(url = %checked_url, error = %reason, "Website unreachable.");
                analysis.push(AnalysisFinding::about(Severity::Warning, "LIVENESS_UNREACHABLE", reason));
            }
        }

        self.enter(Stage::BruteForcingRecovery);
        let probe_ref = self.deps.probe.as_ref();
        let mut candidates = brute_force_directories(probe_ref, &checked_url, self.workers).await;
        if candidates.is_empty() {
            candidates = brute_force_pages(probe_ref, &checked_url, self.workers).await;
        }

        let final_url = match candidates.first() {
            Some(recovered) => {
                info!(url = %recovered, "Recovered a working URL.");
                analysis.push(AnalysisFinding::about(Severity::Info, "LIVENESS_RECOVERED", recovered.clone()));
                recovered.clone()
            }
            None => {
                info!(url = %checked_url, "No valid URLs found based on the wordlist.");
                analysis.push(AnalysisFinding::new(Severity::Info, "LIVENESS_NOT_RECOVERED"));
                checked_url.clone()
            }
        };

        LivenessResults {
            checked_url,
            probe: Some(probe),
            recovery_candidates: candidates,
            final_url,
            analysis,
        }
    }

    /// Extracts fresh features for the raw input and the final URL, then
    /// classifies the final URL.
    async fn classify(&self, input: &str, final_url: &str) -> ClassificationResults {
        self.enter(Stage::ExtractingFeatures);
        // Vectors from a previous run must never reach this prediction.
        self.deps.extractor.invalidate();
        let input_features = self.deps.extractor.url_to_features(input).await;
        let final_features = self.deps.extractor.url_to_features(final_url).await;

        self.enter(Stage::ClassifyingUrl);
        let verdict = match self.deps.classifier.predict(&final_features) {
            Ok(verdict) => {
                info!(url = final_url, ?verdict, "URL classified.");
                Ok(Some(verdict))
            }
            Err(e) => {
                error!(url = final_url, error = %e, "Classification failed.");
                Err("Unable to classify this URL.".to_string())
            }
        };

        let mut results = ClassificationResults {
            input_features: Some(input_features),
            final_features: Some(final_features),
            verdict,
            analysis: Vec::new(),
        };
        results.analysis = analyze_classification_results(&results);
        results
    }
}

fn analyze_fuzz_results(results: &FuzzResults) -> Vec<AnalysisFinding> {
    let vhosts = results.vhosts.iter().map(|u| AnalysisFinding::about(Severity::Info, "FUZZ_VHOST_FOUND", u.clone()));
    let apis = results
        .api_endpoints
        .iter()
        .map(|u| AnalysisFinding::about(Severity::Warning, "FUZZ_API_ENDPOINT_FOUND", u.clone()));
    let params = results
        .parameters
        .iter()
        .map(|u| AnalysisFinding::about(Severity::Warning, "FUZZ_PARAMETER_ACCEPTED", u.clone()));
    vhosts.chain(apis).chain(params).collect()
}

fn analyze_classification_results(results: &ClassificationResults) -> Vec<AnalysisFinding> {
    let finding = match &results.verdict {
        Ok(Some(Verdict::Malicious)) => AnalysisFinding::new(Severity::Critical, "CLASSIFIER_MALICIOUS"),
        Ok(Some(Verdict::Safe)) => AnalysisFinding::new(Severity::Info, "CLASSIFIER_SAFE"),
        Ok(Some(Verdict::Unknown)) => AnalysisFinding::new(Severity::Warning, "CLASSIFIER_UNKNOWN"),
        Ok(None) | Err(_) => AnalysisFinding::new(Severity::Warning, "CLASSIFIER_FAILED"),
    };
    vec![finding]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::FEATURE_SCHEMA;
    use crate::core::scanner::dns_scanner::DnsDataset;
    use crate::core::scanner::testing::{FakeDataset, FakeProbe, FakeResolver};
    use serde_json::json;

    /// Plain-http URLs are malicious, https ones safe.
    fn tls_classifier() -> Arc<Classifier> {
        let model = json!({
            "features": FEATURE_SCHEMA,
            "classes": [false, true],
            "trees": [{"nodes": [
                {"feature": 10, "threshold": 0.5, "left": 1, "right": 2},
                {"value": [0.0, 1.0]},
                {"value": [1.0, 0.0]}
            ]}]
        });
        Arc::new(Classifier::from_json(&model.to_string()).unwrap())
    }

    fn deps(probe: Arc<FakeProbe>, dataset: Option<DnsDataset>, classifier: Arc<Classifier>) -> Dependencies {
        Dependencies {
            probe,
            resolver: Arc::new(FakeResolver::default()),
            dns_dataset: Some(Arc::new(FakeDataset(dataset))),
            threat_intel: None,
            classifier,
            extractor: FeatureExtractor::lexical(),
            login_client: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_target_stays_idle() {
        let orchestrator = Orchestrator::new(deps(Arc::new(FakeProbe::new()), None, tls_classifier()), 4, None);
        assert!(orchestrator.run("  ").await.is_none());
    }

    #[tokio::test]
    async fn test_trailing_404_is_stripped_and_live_site_is_not_brute_forced() {
        let probe = Arc::new(FakeProbe::new().with("http://example.com/", 200));
        let orchestrator = Orchestrator::new(deps(probe.clone(), None, tls_classifier()), 4, None);

        let report = orchestrator.run("http://example.com/404/").await.unwrap();
        let liveness = report.liveness_results.unwrap();
        assert_eq!(liveness.checked_url, "http://example.com/");
        assert_eq!(liveness.final_url, "http://example.com/");
        assert!(liveness.recovery_candidates.is_empty());
        assert!(!probe.calls().iter().any(|u| u.ends_with("admin.php") || u.ends_with("/about")));
    }

    #[tokio::test]
    async fn test_dns_dataset_findings_reach_the_report() {
        let dataset: DnsDataset = serde_json::from_value(json!({
            "a": [{"host": "api.example.com",
                   "ips": [{"ip": "1.2.3.4", "banners": {"http": {"title": "Example API Gateway"}}}]}]
        }))
        .unwrap();
        let probe = Arc::new(FakeProbe::new().with("http://1.2.3.4/api/v1/", 200));
        let orchestrator = Orchestrator::new(deps(probe, Some(dataset), tls_classifier()), 4, None);

        let report = orchestrator.run("example.com").await.unwrap();
        let findings = report.dns_results.dataset.clone().unwrap().unwrap();
        assert!(findings.subdomains.contains("api.example.com"));
        assert!(findings.ip_addresses.contains("1.2.3.4"));
        assert!(findings.potential_apis.contains("http://1.2.3.4"));
        assert_eq!(report.fuzz_results.api_endpoints, vec!["http://1.2.3.4/api/v1/".to_string()]);
    }

    #[tokio::test]
    async fn test_dead_url_is_recovered_with_first_hit() {
        let probe = Arc::new(
            FakeProbe::new()
                .with("http://example.com/gone", 404)
                .with("http://example.com/login.php", 200)
                .with("http://example.com/admin.html", 200),
        );
        let orchestrator = Orchestrator::new(deps(probe, None, tls_classifier()), 4, None);

        let report = orchestrator.run("http://example.com/gone").await.unwrap();
        let liveness = report.liveness_results.unwrap();
        assert_eq!(
            liveness.recovery_candidates,
            vec!["http://example.com/admin.html".to_string(), "http://example.com/login.php".to_string()]
        );
        assert_eq!(liveness.final_url, "http://example.com/admin.html");
        assert!(liveness.analysis.iter().any(|a| a.code == "LIVENESS_NOT_OK"));

        let classification = report.classification_results;
        assert_eq!(classification.final_features.unwrap().get("file_length"), Some(10));
        assert_eq!(classification.verdict, Ok(Some(Verdict::Malicious)));
    }

    #[tokio::test]
    async fn test_everything_unreachable_still_reports() {
        let probe = Arc::new(FakeProbe::new());
        let orchestrator = Orchestrator::new(deps(probe, None, tls_classifier()), 4, None);

        let report = orchestrator.run("https://offline.example.org/").await.unwrap();
        let liveness = report.liveness_results.unwrap();
        assert_eq!(liveness.final_url, "https://offline.example.org/");
        assert!(liveness.analysis.iter().any(|a| a.code == "LIVENESS_UNREACHABLE"));
        assert!(liveness.analysis.iter().any(|a| a.code == "LIVENESS_NOT_RECOVERED"));
        assert!(report.fuzz_results.vhosts.is_empty());
        assert_eq!(report.classification_results.verdict, Ok(Some(Verdict::Safe)));
        assert_eq!(report.dns_results.dataset, Ok(None));
    }

    #[tokio::test]
    async fn test_classification_failure_is_isolated() {
        let model = json!({
            "features": ["length_url"],
            "classes": [0, 1],
            "trees": [{"nodes": [{"value": [1.0, 0.0]}]}]
        });
        let classifier = Arc::new(Classifier::from_json(&model.to_string()).unwrap());
        let probe = Arc::new(FakeProbe::new().with("https://example.com/", 200));
        let orchestrator = Orchestrator::new(deps(probe, None, classifier), 4, None);

        let report = orchestrator.run("https://example.com/").await.unwrap();
        assert_eq!(report.classification_results.verdict, Err("Unable to classify this URL.".to_string()));
        assert_eq!(report.classification_results.analysis[0].code, "CLASSIFIER_FAILED");
        assert!(report.liveness_results.is_some());
    }

    #[tokio::test]
    async fn test_each_run_predicts_afresh() {
        let classifier = tls_classifier();
        let probe = Arc::new(FakeProbe::new().with("https://example.com/", 200));
        let orchestrator = Orchestrator::new(deps(probe, None, classifier.clone()), 4, None);

        orchestrator.run("https://example.com/").await.unwrap();
        orchestrator.run("https://example.com/").await.unwrap();
        assert_eq!(classifier.evaluations(), 2);
    }

    #[tokio::test]
    async fn test_ip_target_skips_virtual_hosts() {
        let probe = Arc::new(FakeProbe::new().with("https://192.0.2.1", 200));
        let orchestrator = Orchestrator::new(deps(probe.clone(), None, tls_classifier()), 4, None);

        let report = orchestrator.run("192.0.2.1").await.unwrap();
        assert_eq!(report.target.kind, TargetKind::IpDst);
        assert!(report.fuzz_results.vhosts.is_empty());
        let calls = probe.calls();
        assert!(!calls.is_empty());
        assert!(!calls.iter().any(|u| u.contains("www.") || u.contains("api.") || u.contains("mail.")));
    }
}
