// # Cloudflare DNS Record Client
//
// `DnsRecordClient` implementation for the Cloudflare API v4.
//
// ## Behaviour
//
// - One HTTP request per trait method call, no retries
// - 30 second timeout on every request
// - Authentication with the global API key (`X-Auth-Email` / `X-Auth-Key`)
// - A write counts as successful only when the response is 2xx AND the
//   body reports `"success": true`
// - Dry-run mode performs lookups but only logs the intended writes
//
// ## Security Requirements
//
// - The API key never appears in logs or Debug output
//
// ## API Reference
//
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfst_ddns_core::config::ProviderConfig;
use cfst_ddns_core::traits::{DnsRecord, DnsRecordClient, RecordPayload, RecordType};
use cfst_ddns_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Envelope shared by every Cloudflare API v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// A DNS record as listed by the API
#[derive(Debug, Deserialize)]
struct ApiRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: RecordType,
    content: String,
    #[serde(default)]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
}

impl From<ApiRecord> for DnsRecord {
    fn from(record: ApiRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            record_type: record.record_type,
            content: record.content,
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

/// Cloudflare DNS record client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform lookups as usual
/// - Log the intended create/update payload
/// - **NOT** modify any record
pub struct CloudflareClient {
    /// Global API key
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Account e-mail the key belongs to
    email: String,

    /// Zone holding the managed records
    zone_id: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform lookups but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("api_key", &"<REDACTED>")
            .field("email", &self.email)
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a new Cloudflare client
    ///
    /// # Parameters
    ///
    /// - `config`: API key, account e-mail and zone identifier
    /// - `dry_run`: If true, perform lookups but skip writes
    ///
    /// Empty credentials are accepted here so a daemon with incomplete
    /// configuration keeps running; every request is refused until they
    /// are set.
    ///
    /// # Errors
    ///
    /// - `Error::Http` if the HTTP client cannot be built
    pub fn new(config: &ProviderConfig, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare client running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            email: config.email.clone(),
            zone_id: config.zone_id.clone(),
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    fn require_credentials(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(Error::config("Cloudflare API key is required"));
        }
        if self.email.is_empty() {
            return Err(Error::config("Cloudflare account e-mail is required"));
        }
        if self.zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID is required"));
        }
        Ok(())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Auth-Email", &self.email)
            .header("X-Auth-Key", &self.api_key)
            .header("Content-Type", "application/json")
    }

    /// Send a request and decode the response envelope
    ///
    /// Non-2xx statuses are mapped to errors before the body is decoded.
    async fn send<T>(&self, request: reqwest::RequestBuilder, action: &str) -> Result<ApiResponse<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.require_credentials()?;

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, action));
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse {} response: {}", action, e)))
    }

    async fn write(&self, request: reqwest::RequestBuilder, action: &str) -> Result<()> {
        let body: ApiResponse<serde_json::Value> = self.send(request, action).await?;

        if !body.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", action, describe_errors(&body.errors)),
            ));
        }
        Ok(())
    }
}

/// Map a non-2xx status to an error
fn status_error(status: reqwest::StatusCode, error_text: &str, action: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid API key/e-mail or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{} target not found: {}", action, error_text)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", action, status, error_text),
        ),
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error detail returned".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl DnsRecordClient for CloudflareClient {
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=a.example.com&type=A
    /// X-Auth-Email: <email>
    /// X-Auth-Key: <key>
    /// ```
    async fn lookup(&self, hostname: &str, record_type: RecordType) -> Result<Option<DnsRecord>> {
        tracing::debug!("Looking up {} record for {}", record_type, hostname);

        let request = self
            .client
            .get(self.records_url())
            .query(&[("name", hostname), ("type", record_type.as_str())]);
        let body: ApiResponse<Vec<ApiRecord>> = self.send(request, "Record lookup").await?;

        if !body.success {
            return Err(Error::provider(
                PROVIDER,
                format!("Record lookup rejected: {}", describe_errors(&body.errors)),
            ));
        }

        let mut records = body.result.unwrap_or_default().into_iter();
        let Some(first) = records.next() else {
            tracing::debug!("No {} record found for {}", record_type, hostname);
            return Ok(None);
        };

        let extra = records.count();
        if extra > 0 {
            tracing::warn!(
                "{} {} records match {}; using the first ({})",
                extra + 1,
                record_type,
                hostname,
                first.id
            );
        }

        tracing::debug!("Found record ID: {}", first.id);
        Ok(Some(first.into()))
    }

    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "A", "name": "...", "content": "...", "ttl": 60, "proxied": false}
    /// ```
    async fn create(&self, payload: &RecordPayload) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                self.records_url(),
                serde_json::to_string(payload).unwrap_or_default()
            );
            return Ok(());
        }

        let request = self.client.post(self.records_url()).json(payload);
        self.write(request, "Record create").await?;

        tracing::info!("DNS record created successfully: {} -> {}", payload.name, payload.content);
        Ok(())
    }

    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "...", "content": "...", "ttl": 60, "proxied": false}
    /// ```
    async fn update(&self, record_id: &str, payload: &RecordPayload) -> Result<()> {
        let url = format!("{}/{}", self.records_url(), record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(payload).unwrap_or_default()
            );
            return Ok(());
        }

        let request = self.client.put(url).json(payload);
        self.write(request, "Record update").await?;

        tracing::info!("DNS record updated successfully: {} -> {}", payload.name, payload.content);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
