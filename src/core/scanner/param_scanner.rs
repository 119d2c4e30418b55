// src/core/scanner/param_scanner.rs

use tracing::info;

use super::fuzz_scanner::{sweep, Acceptance, JoinStrategy};
use super::probe::Probe;
use crate::core::models::FuzzResult;

/// Query parameter the payloads are injected into.
pub const FUZZ_PARAMETER: &str = "param";

/// One representative payload per injection class: SQL, script, path traversal.
pub const INJECTION_PAYLOADS: &[&str] = &["' OR 1=1 --", "<script>alert('XSS')</script>", "../etc/passwd"];

/// Injects each payload into `?param=` and keeps the URLs the server accepted.
///
/// A 2xx answer only means the request went through, not that the injection
/// worked. Payloads whose request fails at the network level are left out.
pub async fn fuzz_parameters(probe: &dyn Probe, base_url: &str, workers: usize) -> FuzzResult {
    info!(base_url, payloads = INJECTION_PAYLOADS.len(), "Fuzzing URL parameters.");
    sweep(
        probe,
        base_url,
        INJECTION_PAYLOADS,
        JoinStrategy::Query { param: FUZZ_PARAMETER },
        Acceptance::Success,
        workers,
    )
    .await
}
