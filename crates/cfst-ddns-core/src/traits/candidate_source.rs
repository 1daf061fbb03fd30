// # Candidate Source Trait
//
// Defines the interface for obtaining ranked endpoint candidates.
//
// ## Implementations
//
// - Results file written by the speed-test tool: `ResultFileReader`

use async_trait::async_trait;

/// One ranked row of speed-test output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCandidate {
    /// Network address (first column)
    pub address: String,
    /// Remaining columns (latency, loss, speed, ...) in file order
    pub metrics: Vec<String>,
}

impl EndpointCandidate {
    /// Create a candidate with no metrics
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            metrics: Vec::new(),
        }
    }
}

/// Trait for ranked candidate sources
///
/// Sources never fail: an unreadable or empty source yields fewer
/// candidates than requested, and callers treat the shortfall as the
/// failure signal.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Return up to `count` candidates, best first
    async fn top(&self, count: usize) -> Vec<EndpointCandidate>;
}
