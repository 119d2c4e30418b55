// src/core/scanner/login_scanner.rs

use tracing::{debug, info, warn};

use super::probe::{PROBE_TIMEOUT, USER_AGENT};
use crate::core::models::{AnalysisFinding, Credential, LoginResults, Severity};

pub const DEFAULT_USERNAMES: &[&str] = &["user1", "user2", "admin"];
pub const DEFAULT_PASSWORDS: &[&str] = &["password1", "password2", "123456"];
pub const DEFAULT_SUCCESS_MARKER: &str = "Login Successful";

/// Every default username paired with every default password, username-major.
pub fn default_credentials() -> Vec<Credential> {
    DEFAULT_USERNAMES
        .iter()
        .flat_map(|u| DEFAULT_PASSWORDS.iter().map(move |p| Credential::new(u, p)))
        .collect()
}

/// HTTP client for login attempts. Cookies set by one attempt are sent with
/// the next, the way a browser session would.
pub fn build_login_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(PROBE_TIMEOUT)
        .cookie_store(true)
        .build()
}

/// Posts each credential pair as a `username`/`password` form to `url` and
/// returns the first pair whose response body contains `success_marker`.
///
/// Failed requests are logged and skipped.
pub async fn attempt_login(
    client: &reqwest::Client,
    url: &str,
    credentials: &[Credential],
    success_marker: &str,
) -> Option<Credential> {
    for credential in credentials {
        let form = [("username", credential.username.as_str()), ("password", credential.password.as_str())];
        let response = match client.post(url).form(&form).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, username = %credential.username, error = %e, "Login attempt failed.");
                continue;
            }
        };
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, error = %e, "Could not read login response.");
                continue;
            }
        };
        if body.contains(success_marker) {
            info!(url, username = %credential.username, "Login accepted.");
            return Some(credential.clone());
        }
        debug!(url, username = %credential.username, "Login rejected.");
    }
    None
}

/// Runs the login probe against `url` and records the outcome.
pub async fn run_login_probe(
    client: &reqwest::Client,
    url: &str,
    credentials: &[Credential],
    success_marker: &str,
) -> LoginResults {
    info!(url, pairs = credentials.len(), "Starting login probe.");
    let accepted = attempt_login(client, url, credentials, success_marker).await;
    let attempts = match &accepted {
        Some(found) => credentials.iter().position(|c| c == found).map_or(credentials.len(), |i| i + 1),
        None => credentials.len(),
    };

    let analysis = match &accepted {
        Some(c) => vec![AnalysisFinding::about(Severity::Critical, "LOGIN_WEAK_CREDENTIALS", c.username.clone())],
        None => vec![AnalysisFinding::new(Severity::Info, "LOGIN_NO_WEAK_CREDENTIALS")],
    };
    LoginResults { accepted: Ok(accepted), attempts, analysis }
}
