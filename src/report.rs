// src/report.rs

//! Plain-text rendering of a `ScanReport`.

use std::fmt::Write;

use crate::core::knowledge_base::{self, FindingCategory, FindingDetail};
use crate::core::models::{ScanReport, Severity, Verdict};

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "✗",
        Severity::Warning => "!",
        Severity::Info => "✓",
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}\n{}", title, "-".repeat(title.chars().count()));
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        let _ = writeln!(out, "{}: none", label);
    } else {
        let _ = writeln!(out, "{}:", label);
        for item in items {
            let _ = writeln!(out, "  - {}", item);
        }
    }
}

/// Renders a report for the terminal.
///
/// # Arguments
/// * `report` - The completed (possibly partial) scan report.
///
/// # Returns
/// The verdict line, one section per stage and the findings, most severe
/// first. Advice is printed for every finding the catalogue does not list
/// as informational.
pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "WebGuard report for {} ({})", report.target.raw, report.target.kind);

    // --- Verdict ---
    let verdict_line = match &report.classification_results.verdict {
        Ok(Some(Verdict::Unknown)) => "Verdict: unknown".to_string(),
        Ok(Some(verdict)) => verdict.message().to_string(),
        Ok(None) => "Verdict: not evaluated".to_string(),
        Err(e) => e.clone(),
    };
    let _ = writeln!(out, "{}", verdict_line);

    // --- DNS ---
    section(&mut out, "DNS Enumeration");
    list(&mut out, "Resolved subdomains", &report.dns_results.resolved_subdomains);
    match &report.dns_results.dataset {
        Ok(Some(findings)) => {
            list(&mut out, "Subdomains", &findings.subdomains.iter().cloned().collect::<Vec<_>>());
            list(&mut out, "IP addresses", &findings.ip_addresses.iter().cloned().collect::<Vec<_>>());
            list(&mut out, "Potential APIs", &findings.potential_apis.iter().cloned().collect::<Vec<_>>());
        }
        Ok(None) => {
            let _ = writeln!(out, "DNS dataset: no data");
        }
        Err(e) => {
            let _ = writeln!(out, "DNS dataset: {}", e);
        }
    }

    // --- Threat intelligence ---
    section(&mut out, "Threat Intelligence");
    match &report.threat_intel_results.matches {
        Ok(Some(matches)) if !matches.is_empty() => {
            for m in matches {
                let _ = writeln!(out, "  - event {} (threat level {}): {}", m.event_id, m.threat_level, m.description);
            }
        }
        Ok(Some(_)) => {
            let _ = writeln!(out, "No matches.");
        }
        Ok(None) => {
            let _ = writeln!(out, "Not queried.");
        }
        Err(e) => {
            let _ = writeln!(out, "Lookup failed: {}", e);
        }
    }

    // --- Fuzzing ---
    section(&mut out, "Endpoint Fuzzing");
    list(&mut out, "Virtual hosts", &report.fuzz_results.vhosts);
    list(&mut out, "API endpoints", &report.fuzz_results.api_endpoints);
    list(&mut out, "Accepted parameters", &report.fuzz_results.parameters);

    // --- Liveness ---
    if let Some(liveness) = &report.liveness_results {
        section(&mut out, "Liveness");
        let status = match &liveness.probe {
            Some(p) => match (p.status, &p.error) {
                (Some(status), _) => format!("HTTP {} in {} ms", status, p.latency_ms),
                (None, Some(failure)) => failure.to_string(),
                (None, None) => "no answer".to_string(),
            },
            None => "not probed".to_string(),
        };
        let _ = writeln!(out, "Checked URL: {} ({})", liveness.checked_url, status);
        if !liveness.recovery_candidates.is_empty() {
            list(&mut out, "Recovery candidates", &liveness.recovery_candidates);
        }
        let _ = writeln!(out, "Classified URL: {}", liveness.final_url);
    }

    // --- Login ---
    match &report.login_results.accepted {
        Ok(Some(credential)) => {
            section(&mut out, "Login Probe");
            let _ = writeln!(
                out,
                "Accepted credentials: {} / {} (after {} attempts)",
                credential.username, credential.password, report.login_results.attempts
            );
        }
        Ok(None) if report.login_results.attempts > 0 => {
            section(&mut out, "Login Probe");
            let _ = writeln!(out, "No credentials accepted ({} attempts).", report.login_results.attempts);
        }
        Ok(None) => {}
        Err(e) => {
            section(&mut out, "Login Probe");
            let _ = writeln!(out, "{}", e);
        }
    }

    // --- Analysis ---
    section(&mut out, "Analysis");
    let findings = report.all_findings();
    if findings.is_empty() {
        let _ = writeln!(out, "No findings.");
    }
    for finding in findings {
        let Some(detail) = knowledge_base::get_finding_detail(&finding.code) else {
            let _ = writeln!(out, "{} {}", severity_icon(finding.severity), finding.code);
            continue;
        };
        let _ = write!(out, "{} [{}] {}", severity_icon(finding.severity), detail.category, detail.title);
        if let Some(subject) = &finding.subject {
            let _ = write!(out, ": {}", subject);
        }
        let _ = writeln!(out);
        if detail.severity != Severity::Info {
            write_detail(&mut out, detail);
        }
    }

    out
}

fn write_detail(out: &mut String, detail: &FindingDetail) {
    let _ = writeln!(out, "    What it is: {}", detail.description);
    if detail.category != FindingCategory::Liveness {
        let _ = writeln!(out, "    How to fix: {}", detail.remediation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{AnalysisFinding, LivenessResults, ProbeResult};
    use crate::core::target::classify_target;

    fn report() -> ScanReport {
        let mut report = ScanReport::new(classify_target("http://example.com/404/").unwrap());
        report.liveness_results = Some(LivenessResults {
            checked_url: "http://example.com/".into(),
            probe: Some(ProbeResult::answered("http://example.com/", 200, 12)),
            recovery_candidates: Vec::new(),
            final_url: "http://example.com/".into(),
            analysis: vec![AnalysisFinding::about(Severity::Info, "LIVENESS_OK", "http://example.com/")],
        });
        report
    }

    #[test]
    fn test_malicious_verdict_leads_the_report() {
        let mut report = report();
        report.classification_results.verdict = Ok(Some(Verdict::Malicious));
        report.classification_results.analysis = vec![AnalysisFinding::new(Severity::Critical, "CLASSIFIER_MALICIOUS")];

        let text = render_text(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "This website might be malicious!");
        assert!(text.contains("✗ [Phishing Classification] URL Classified as Phishing"));
        assert!(text.contains("How to fix:"));
        assert!(text.contains("Checked URL: http://example.com/ (HTTP 200 in 12 ms)"));
    }

    #[test]
    fn test_failed_classification_is_reported_opaquely() {
        let mut report = report();
        report.classification_results.verdict = Err("Unable to classify this URL.".into());
        let text = render_text(&report);
        assert!(text.contains("Unable to classify this URL."));
        assert!(!text.contains("Login Probe"));
    }

    #[test]
    fn test_advice_follows_catalogue_severity() {
        let mut report = report();
        report.dns_results.analysis = vec![AnalysisFinding::new(Severity::Info, "DNS_DATASET_SKIPPED")];
        report.threat_intel_results.analysis =
            vec![AnalysisFinding::about(Severity::Critical, "THREAT_INTEL_MATCH", "event 42")];

        let text = render_text(&report);
        assert_eq!(text.matches("What it is:").count(), 1);
        assert!(text.contains("[Threat Intelligence] Indicator Found in Threat Intelligence: event 42"));
        assert!(text.contains("    How to fix: Review the referenced event"));
    }
}
