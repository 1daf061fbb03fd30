//! Core traits for the DDNS updater
//!
//! This module defines the abstract interfaces the reconciler is built on.
//!
//! - [`DnsRecordClient`]: Look up and write DNS records via provider APIs
//! - [`CandidateSource`]: Ranked endpoint candidates
//! - [`SpeedTest`]: Measurement step producing fresh candidates

pub mod dns_client;
pub mod candidate_source;

pub use dns_client::{DnsRecord, DnsRecordClient, RecordPayload, RecordType, UpsertResult, RECORD_TTL};
pub use candidate_source::{CandidateSource, EndpointCandidate};
pub use speed_test::SpeedTest;
