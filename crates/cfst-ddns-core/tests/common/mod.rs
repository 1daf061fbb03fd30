//! Test doubles and common utilities for reconciliation contract tests
//!
//! This module provides minimal in-memory stand-ins for the provider API,
//! the results file and the speed test, each recording how it was called.

#![allow(dead_code)]

use cfst_ddns_core::config::{DdnsConfig, ProviderConfig};
use cfst_ddns_core::error::{Error, Result};
use cfst_ddns_core::traits::{
    CandidateSource, DnsRecord, DnsRecordClient, EndpointCandidate, RecordPayload, RecordType,
    SpeedTest,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One call made against the in-memory provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Lookup(String, RecordType),
    Create(RecordPayload),
    Update(String, RecordPayload),
}

#[derive(Default)]
struct ZoneState {
    records: Vec<DnsRecord>,
    calls: Vec<ClientCall>,
    next_id: usize,
    failing_lookups: HashSet<String>,
    failing_writes: HashSet<String>,
}

/// An in-memory provider zone that records every call
pub struct InMemoryDnsClient {
    state: Arc<Mutex<ZoneState>>,
}

impl InMemoryDnsClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ZoneState::default())),
        }
    }

    /// Create a client that shares the zone and call log with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            state: Arc::clone(&other.state),
        }
    }

    /// Seed an existing record
    pub fn with_record(self, id: &str, name: &str, record_type: RecordType, content: &str) -> Self {
        self.state.lock().unwrap().records.push(DnsRecord {
            id: id.to_string(),
            name: name.to_string(),
            record_type,
            content: content.to_string(),
            ttl: 300,
            proxied: false,
        });
        self
    }

    /// Make lookups for `hostname` fail as if the API were unreachable
    pub fn failing_lookup(self, hostname: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(hostname.to_string());
        self
    }

    /// Make writes for `hostname` come back with `success: false`
    pub fn failing_write(self, hostname: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert(hostname.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ClientCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn records(&self) -> Vec<DnsRecord> {
        self.state.lock().unwrap().records.clone()
    }

    /// Number of lookups, which equals the number of upserts started
    pub fn upsert_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ClientCall::Lookup(..)))
            .count()
    }

    /// (hostname, address) pairs written, in order
    pub fn writes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClientCall::Create(p) | ClientCall::Update(_, p) => Some((p.name, p.content)),
                ClientCall::Lookup(..) => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DnsRecordClient for InMemoryDnsClient {
    async fn lookup(&self, hostname: &str, record_type: RecordType) -> Result<Option<DnsRecord>> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(ClientCall::Lookup(hostname.to_string(), record_type));

        if state.failing_lookups.contains(hostname) {
            return Err(Error::http("connection refused"));
        }

        Ok(state
            .records
            .iter()
            .find(|r| r.name == hostname && r.record_type == record_type)
            .cloned())
    }

    async fn create(&self, payload: &RecordPayload) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ClientCall::Create(payload.clone()));

        if state.failing_writes.contains(&payload.name) {
            return Err(Error::provider("memory", "success: false"));
        }

        state.next_id += 1;
        let id = format!("rec_{}", state.next_id);
        state.records.push(DnsRecord {
            id,
            name: payload.name.clone(),
            record_type: payload.record_type,
            content: payload.content.clone(),
            ttl: payload.ttl,
            proxied: payload.proxied,
        });
        Ok(())
    }

    async fn update(&self, record_id: &str, payload: &RecordPayload) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(ClientCall::Update(record_id.to_string(), payload.clone()));

        if state.failing_writes.contains(&payload.name) {
            return Err(Error::provider("memory", "success: false"));
        }

        let record = state
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::not_found(record_id.to_string()))?;
        record.content = payload.content.clone();
        record.ttl = payload.ttl;
        record.proxied = payload.proxied;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

/// A fixed list of ranked candidates
pub struct StaticCandidates {
    candidates: Vec<EndpointCandidate>,
}

impl StaticCandidates {
    pub fn new(addresses: &[&str]) -> Self {
        Self {
            candidates: addresses.iter().map(|a| EndpointCandidate::new(*a)).collect(),
        }
    }
}

#[async_trait::async_trait]
impl CandidateSource for StaticCandidates {
    async fn top(&self, count: usize) -> Vec<EndpointCandidate> {
        self.candidates.iter().take(count).cloned().collect()
    }
}

/// A speed test that counts runs and can fail or block on demand
pub struct ControlledSpeedTest {
    run_count: Arc<AtomicUsize>,
    fail: bool,
    started: Option<Arc<Notify>>,
    release: Option<Arc<Notify>>,
}

impl ControlledSpeedTest {
    pub fn new() -> Self {
        Self {
            run_count: Arc::new(AtomicUsize::new(0)),
            fail: false,
            started: None,
            release: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Notify `started` when a run begins, then wait for `release`
    pub fn blocking(started: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            started: Some(started),
            release: Some(release),
            ..Self::new()
        }
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            run_count: Arc::clone(&other.run_count),
            fail: other.fail,
            started: other.started.clone(),
            release: other.release.clone(),
        }
    }

    pub fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SpeedTest for ControlledSpeedTest {
    async fn run(&self) -> Result<()> {
        self.run_count.fetch_add(1, Ordering::SeqCst);

        if let Some(started) = &self.started {
            started.notify_one();
        }
        if let Some(release) = &self.release {
            release.notified().await;
        }

        if self.fail {
            return Err(Error::measurement("speed test exited with status 1"));
        }
        Ok(())
    }
}

/// Helper to create a valid configuration for the given hostnames
pub fn test_config(hostnames: &[&str]) -> DdnsConfig {
    DdnsConfig::new(
        ProviderConfig {
            api_key: "test-key".to_string(),
            email: "ops@example.com".to_string(),
            zone_id: "test-zone".to_string(),
        },
        hostnames.iter().map(|h| h.to_string()).collect(),
    )
}

pub fn hostnames(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}
