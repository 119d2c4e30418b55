// src/core/target.rs

use crate::core::models::{Target, TargetKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

static RE_IPV4: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").unwrap());
static RE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9_-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z0-9][A-Za-z0-9_-]{0,61}[A-Za-z]$").unwrap()
});
static RE_EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.+-]+@([\w-]+\.)+[\w-]{2,}$").unwrap());

/// Determines which indicator type a raw input string is.
///
/// Anything that is not a bare IPv4 address, domain or email address is
/// treated as a URL.
pub fn identify_input_type(text: &str) -> TargetKind {
    if RE_IPV4.is_match(text) {
        TargetKind::IpDst
    } else if RE_DOMAIN.is_match(text) {
        TargetKind::Domain
    } else if RE_EMAIL.is_match(text) {
        TargetKind::Email
    } else {
        TargetKind::Url
    }
}

/// Classifies and normalizes a user-supplied target.
///
/// Returns `None` for empty (or whitespace-only) input, which never starts a run.
pub fn classify_target(input: &str) -> Option<Target> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }

    let kind = identify_input_type(raw);
    let domain = match kind {
        TargetKind::Email => raw.rsplit('@').next().unwrap_or(raw).to_string(),
        _ => extract_domain(raw),
    };
    let url = match kind {
        TargetKind::Email => format!("https://{}/", domain),
        _ if raw.contains("://") => raw.to_string(),
        _ => format!("https://{}", raw),
    };

    debug!(raw, kind = %kind, %domain, %url, "Target classified.");
    Some(Target { raw: raw.to_string(), kind, url, domain })
}

/// Extracts the host part of a URL-ish string, falling back to everything before the first `/`.
pub fn extract_domain(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .filter(|u| u.has_host())
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| raw.split('/').next().unwrap_or(raw).to_string())
}
