//! Hostname reconciliation
//!
//! The Reconciler is responsible for:
//! - Reading the top-N ranked candidates (N = number of hostnames)
//! - Binding the i-th hostname to the i-th candidate
//! - Upserting each binding through the DnsRecordClient
//! - Aggregating per-hostname outcomes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ CandidateSource │─── top(n) ───┐
//! └─────────────────┘              │
//!                                  ▼
//!                         ┌──────────────┐
//!                         │  Reconciler  │── PassReport
//!                         └──────────────┘
//!                                  │
//!                      upsert(H[i], candidates[i])
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │ DnsRecordClient │
//!                         └─────────────────┘
//! ```
//!
//! ## Binding Rules
//!
//! 1. Fewer candidates than hostnames: the pass is aborted, nothing written
//! 2. Hostnames are processed one at a time, in configured order
//! 3. A failed hostname never stops the ones after it
//! 4. Nothing is rolled back; the batch is best-effort

use crate::error::{Error, Result};
use crate::traits::{CandidateSource, DnsRecordClient, RecordType, UpsertResult};
use tracing::{debug, error, info};

/// Outcome for a single hostname
#[derive(Debug)]
pub struct HostnameOutcome {
    /// Managed hostname
    pub hostname: String,
    /// Address it was bound to
    pub address: String,
    /// What the provider did, or why it failed
    pub result: Result<UpsertResult>,
}

impl HostnameOutcome {
    /// Whether the provider confirmed the write
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate result of one reconciliation pass
#[derive(Debug)]
pub struct PassReport {
    /// Per-hostname outcomes, in configured order
    pub outcomes: Vec<HostnameOutcome>,
}

impl PassReport {
    /// Hostnames attempted
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Hostnames the provider confirmed
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Whether every hostname was written
    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.attempted()
    }

    /// Hostnames that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.hostname.as_str(), e)))
    }
}

impl std::fmt::Display for PassReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {} hostname(s) updated",
            self.succeeded(),
            self.attempted()
        )
    }
}

/// Maps hostnames onto ranked candidates and writes the records
pub struct Reconciler {
    /// Ranked candidates
    source: Box<dyn CandidateSource>,

    /// DNS provider client
    client: Box<dyn DnsRecordClient>,

    /// A or AAAA, from the configured address family
    record_type: RecordType,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        source: Box<dyn CandidateSource>,
        client: Box<dyn DnsRecordClient>,
        record_type: RecordType,
    ) -> Self {
        Self {
            source,
            client,
            record_type,
        }
    }

    /// Run one reconciliation pass over `hostnames`
    ///
    /// # Returns
    ///
    /// - `Ok(PassReport)`: every hostname was attempted; the report holds
    ///   the per-hostname outcomes
    /// - `Err(Error::InsufficientCandidates)`: fewer candidates than
    ///   hostnames; no record was touched
    pub async fn reconcile(&self, hostnames: &[String]) -> Result<PassReport> {
        let need = hostnames.len();
        info!("Requesting {} candidate(s) for {} hostname(s)", need, need);

        let candidates = self.source.top(need).await;
        if candidates.len() < need {
            error!(
                "Need {} candidate(s) but only {} available, aborting pass",
                need,
                candidates.len()
            );
            return Err(Error::InsufficientCandidates {
                have: candidates.len(),
                need,
            });
        }

        let mut outcomes = Vec::with_capacity(need);
        for (hostname, candidate) in hostnames.iter().zip(candidates) {
            let address = candidate.address;
            info!("Updating {} -> {}", hostname, address);

            let result = self
                .client
                .upsert(hostname, &address, self.record_type)
                .await;

            match &result {
                Ok(UpsertResult::Created) => {
                    info!("Created {} record {} -> {}", self.record_type, hostname, address);
                }
                Ok(UpsertResult::Updated { previous_content, .. }) => {
                    info!(
                        "Updated {} record {} -> {} (previous: {})",
                        self.record_type, hostname, address, previous_content
                    );
                }
                Err(e) => {
                    error!(
                        "Failed to update {} via {}: {}",
                        hostname,
                        self.client.provider_name(),
                        e
                    );
                    // Continue with the remaining hostnames
                }
            }

            outcomes.push(HostnameOutcome {
                hostname: hostname.clone(),
                address,
                result,
            });
        }

        let report = PassReport { outcomes };
        debug!("Pass finished: {}", report);
        Ok(report)
    }
}
