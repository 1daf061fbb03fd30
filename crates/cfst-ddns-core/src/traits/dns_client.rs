// # DNS Record Client Trait
//
// Defines the interface for reading and writing A/AAAA records via a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `cfst-ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfst_ddns_core::traits::{DnsRecordClient, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* DnsRecordClient implementation */;
//
//     // Point a hostname at an address, creating the record if needed
//     client.upsert("a.example.com", "1.2.3.4", RecordType::A).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// TTL written on every managed record (seconds)
///
/// Kept short so resolvers pick up a new endpoint within a minute.
pub const RECORD_TTL: u32 = 60;

/// DNS record type managed by the updater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-side record as returned by a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Provider-assigned identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// A or AAAA
    pub record_type: RecordType,
    /// Target address
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Whether the provider proxies traffic for this record
    pub proxied: bool,
}

/// Body of a create or update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPayload {
    /// A or AAAA
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully-qualified record name
    pub name: String,
    /// Target address
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Proxying through the provider; always off for direct-to-origin DDNS
    pub proxied: bool,
}

impl RecordPayload {
    /// Build the payload written for every managed record
    pub fn new(record_type: RecordType, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            record_type,
            name: name.into(),
            content: content.into(),
            ttl: RECORD_TTL,
            proxied: false,
        }
    }
}

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertResult {
    /// No record existed; one was created
    Created,
    /// An existing record was rewritten
    Updated {
        /// Identifier of the rewritten record
        record_id: String,
        /// Address the record pointed at before the write
        previous_content: String,
    },
}

/// Trait for DNS provider clients
///
/// Implementations perform exactly one HTTP round trip per method call and
/// never retry. Retries happen only through the next scheduled pass.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsRecordClient: Send + Sync {
    /// Look up the record for an exact (hostname, type) pair
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: the record exists; on multiple matches the
    ///   first one returned by the provider
    /// - `Ok(None)`: the provider reported no such record
    /// - `Err(Error)`: the query itself failed; callers must not treat this
    ///   as absence
    async fn lookup(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>, crate::Error>;

    /// Create a new record
    ///
    /// Succeeds only if the provider explicitly reports success.
    async fn create(&self, payload: &RecordPayload) -> Result<(), crate::Error>;

    /// Overwrite the record with the given identifier
    ///
    /// Succeeds only if the provider explicitly reports success.
    async fn update(&self, record_id: &str, payload: &RecordPayload) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Point `hostname` at `address`, creating the record if it is absent
    ///
    /// Performs one lookup and at most one write. A failed lookup returns
    /// the error without attempting a write.
    ///
    /// # Idempotency
    ///
    /// Calling this twice with the same address leaves exactly one record:
    /// the second call finds the record created by the first and updates it.
    async fn upsert(
        &self,
        hostname: &str,
        address: &str,
        record_type: RecordType,
    ) -> Result<UpsertResult, crate::Error> {
        let payload = RecordPayload::new(record_type, hostname, address);

        match self.lookup(hostname, record_type).await? {
            Some(existing) => {
                tracing::debug!(
                    "Updating {} record {} ({}): {} -> {}",
                    record_type,
                    hostname,
                    existing.id,
                    existing.content,
                    address
                );
                self.update(&existing.id, &payload).await?;
                Ok(UpsertResult::Updated {
                    record_id: existing.id,
                    previous_content: existing.content,
                })
            }
            None => {
                tracing::debug!("Creating {} record {} -> {}", record_type, hostname, address);
                self.create(&payload).await?;
                Ok(UpsertResult::Created)
            }
        }
    }
}
