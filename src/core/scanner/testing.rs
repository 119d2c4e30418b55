// src/core/scanner/testing.rs
//
// In-memory collaborators shared by the scanner unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::dns_scanner::{DnsDataset, DnsDatasetSource, NameResolver};
use super::probe::Probe;
use super::threat_intel::ThreatIntel;
use crate::core::models::{ProbeFailure, ProbeResult, TargetKind, ThreatMatch};

/// Answers from a fixed status table; unknown URLs fail to connect.
#[derive(Default)]
pub struct FakeProbe {
    statuses: HashMap<String, u16>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of requests that were ever answered at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn answer(&self, url: &str) -> ProbeResult {
        self.calls.lock().unwrap().push(url.to_string());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.statuses.get(url) {
            Some(status) => ProbeResult::answered(url, *status, 1),
            None => ProbeResult::failed(url, ProbeFailure::Connect("connection refused".into()), 1),
        }
    }
}

#[async_trait]
impl Probe for FakeProbe {
    async fn exists(&self, url: &str) -> bool {
        let result = self.answer(url).await;
        result.reachable() && !result.is_not_found()
    }

    async fn fetch(&self, url: &str) -> ProbeResult {
        self.answer(url).await
    }
}

/// Resolves only the listed hosts.
#[derive(Default)]
pub struct FakeResolver {
    pub hosts: Vec<String>,
}

#[async_trait]
impl NameResolver for FakeResolver {
    async fn resolve_a(&self, host: &str) -> Result<Vec<std::net::Ipv4Addr>, String> {
        if self.hosts.iter().any(|h| h == host) {
            Ok(vec![std::net::Ipv4Addr::new(10, 0, 0, 1)])
        } else {
            Err(format!("no record found for {}", host))
        }
    }
}

pub struct FakeDataset(pub Option<DnsDataset>);

#[async_trait]
impl DnsDatasetSource for FakeDataset {
    async fn fetch_dataset(&self, _domain: &str) -> Option<DnsDataset> {
        self.0.clone()
    }
}

pub struct FakeThreatIntel(pub Result<Vec<ThreatMatch>, String>);

#[async_trait]
impl ThreatIntel for FakeThreatIntel {
    async fn search(&self, _value: &str, _kind: TargetKind) -> Result<Vec<ThreatMatch>, String> {
        self.0.clone()
    }
}
