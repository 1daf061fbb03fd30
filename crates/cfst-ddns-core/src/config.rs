//! Configuration types for the DDNS updater
//!
//! The configuration is built once at startup (the daemon reads it from the
//! environment) and shared read-only afterwards. Nothing in this crate reads
//! ambient process state; every component receives the values it needs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::traits::RecordType;

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider credentials
    pub provider: ProviderConfig,

    /// Hostnames to manage, in binding order
    pub hostnames: Vec<String>,

    /// Speed-test tuning and file locations
    #[serde(default)]
    pub measurement: MeasurementConfig,

    /// Startup and cadence settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Perform lookups but skip record writes
    #[serde(default)]
    pub dry_run: bool,
}

impl DdnsConfig {
    /// Create a configuration for the given credentials and hostnames
    pub fn new(provider: ProviderConfig, hostnames: Vec<String>) -> Self {
        Self {
            provider,
            hostnames,
            measurement: MeasurementConfig::default(),
            schedule: ScheduleConfig::default(),
            dry_run: false,
        }
    }

    /// Validate the configuration
    ///
    /// Every missing required field is reported in a single error so that a
    /// misconfigured deployment can be fixed in one round.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let mut missing = self.provider.missing_fields();
        if self.hostnames.is_empty() {
            missing.push("hostnames");
        }
        if !missing.is_empty() {
            return Err(crate::Error::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        for hostname in &self.hostnames {
            validate_hostname(hostname)?;
        }

        self.measurement.validate()?;

        Ok(())
    }

    /// Record type managed for the configured address family
    pub fn record_type(&self) -> RecordType {
        self.measurement.ip_family.record_type()
    }
}

/// Cloudflare credentials
///
/// The Debug implementation does not expose the API key.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Global API key
    pub api_key: String,
    /// Account e-mail the key belongs to
    pub email: String,
    /// Zone holding the managed records
    pub zone_id: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<REDACTED>")
            .field("email", &self.email)
            .field("zone_id", &self.zone_id)
            .finish()
    }
}

impl ProviderConfig {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.trim().is_empty() {
            missing.push("api_key");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.zone_id.trim().is_empty() {
            missing.push("zone_id");
        }
        missing
    }
}

/// Address family the speed test measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    /// IPv4 candidates, A records
    #[default]
    Ipv4,
    /// IPv6 candidates, AAAA records
    Ipv6,
}

impl IpFamily {
    /// Record type written for this family
    pub fn record_type(self) -> RecordType {
        match self {
            IpFamily::Ipv4 => RecordType::A,
            IpFamily::Ipv6 => RecordType::Aaaa,
        }
    }

    /// Default candidate list file name for this family
    pub fn address_list_name(self) -> &'static str {
        match self {
            IpFamily::Ipv4 => "ip.txt",
            IpFamily::Ipv6 => "ipv6.txt",
        }
    }
}

impl std::str::FromStr for IpFamily {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ipv4" | "v4" | "4" => Ok(IpFamily::Ipv4),
            "ipv6" | "v6" | "6" => Ok(IpFamily::Ipv6),
            other => Err(crate::Error::config(format!(
                "unknown IP family '{}', expected ipv4 or ipv6",
                other
            ))),
        }
    }
}

/// Speed-test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Skip the speed test and reconcile from the existing results file
    #[serde(default)]
    pub skip: bool,

    /// Directory holding the executable, address lists and results
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Executable file name inside `work_dir`
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Results file name inside `work_dir`
    #[serde(default = "default_result_file")]
    pub result_file: String,

    /// Address family to measure
    #[serde(default)]
    pub ip_family: IpFamily,

    /// Concurrent latency tests
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// Latency tests per address
    #[serde(default = "default_test_count")]
    pub test_count: u32,

    /// Addresses to download-test
    #[serde(default = "default_download_count")]
    pub download_count: u32,

    /// Download test duration per address (seconds)
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u32,

    /// Upper latency bound (ms)
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u32,

    /// Lower latency bound (ms)
    #[serde(default)]
    pub min_latency_ms: u32,

    /// Upper packet-loss bound (0.00 - 1.00)
    #[serde(default = "default_max_packet_loss")]
    pub max_packet_loss: f64,

    /// Lower download speed bound (MB/s)
    #[serde(default)]
    pub min_download_speed: f64,

    /// Port to test
    #[serde(default = "default_port")]
    pub port: u16,

    /// Custom download-test URL
    #[serde(default)]
    pub url: Option<String>,

    /// Download the executable from the latest release when it is missing
    #[serde(default)]
    pub auto_install: bool,

    /// Release metadata endpoint used by `auto_install`
    #[serde(default = "default_release_url")]
    pub release_url: String,
}

impl MeasurementConfig {
    /// Full path of the speed-test executable
    pub fn executable_path(&self) -> PathBuf {
        self.work_dir.join(&self.executable)
    }

    /// Full path of the ranked results file
    pub fn result_path(&self) -> PathBuf {
        self.work_dir.join(&self.result_file)
    }

    /// Full path of the candidate address list for the configured family
    pub fn address_list_path(&self) -> PathBuf {
        self.work_dir.join(self.ip_family.address_list_name())
    }

    /// Validate the tuning ranges
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.result_file.is_empty() {
            return Err(crate::Error::config("results file name cannot be empty"));
        }
        if !(0.0..=1.0).contains(&self.max_packet_loss) {
            return Err(crate::Error::config(format!(
                "max packet loss must be between 0.00 and 1.00, got {}",
                self.max_packet_loss
            )));
        }
        if self.min_download_speed < 0.0 {
            return Err(crate::Error::config(format!(
                "min download speed cannot be negative, got {}",
                self.min_download_speed
            )));
        }
        if self.min_latency_ms > self.max_latency_ms {
            return Err(crate::Error::config(format!(
                "min latency ({} ms) exceeds max latency ({} ms)",
                self.min_latency_ms, self.max_latency_ms
            )));
        }
        if self.threads == 0 {
            return Err(crate::Error::config("thread count must be > 0"));
        }
        Ok(())
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            skip: false,
            work_dir: default_work_dir(),
            executable: default_executable(),
            result_file: default_result_file(),
            ip_family: IpFamily::default(),
            threads: default_threads(),
            test_count: default_test_count(),
            download_count: default_download_count(),
            download_timeout_secs: default_download_timeout_secs(),
            max_latency_ms: default_max_latency_ms(),
            min_latency_ms: 0,
            max_packet_loss: default_max_packet_loss(),
            min_download_speed: 0.0,
            port: default_port(),
            url: None,
            auto_install: false,
            release_url: default_release_url(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("/app")
}

fn default_executable() -> String {
    "cfst".to_string()
}

fn default_release_url() -> String {
    "https://api.github.com/repos/XIU2/CloudflareSpeedTest/releases/latest".to_string()
}

fn default_result_file() -> String {
    "result.csv".to_string()
}

fn default_threads() -> u32 {
    200
}

fn default_test_count() -> u32 {
    4
}

fn default_download_count() -> u32 {
    10
}

fn default_download_timeout_secs() -> u32 {
    10
}

fn default_max_latency_ms() -> u32 {
    9999
}

fn default_max_packet_loss() -> f64 {
    1.0
}

fn default_port() -> u16 {
    443
}

/// Startup and cadence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Run one pass as soon as the daemon starts
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,

    /// Cron expression for periodic passes
    #[serde(default)]
    pub cron: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_on_startup: default_run_on_startup(),
            cron: None,
        }
    }
}

fn default_run_on_startup() -> bool {
    true
}

/// Validate that a string is a usable DNS hostname
///
/// Basic RFC 1035 checks; a leading `*` label is accepted for wildcard
/// records.
pub fn validate_hostname(hostname: &str) -> Result<(), crate::Error> {
    if hostname.is_empty() {
        return Err(crate::Error::config("hostname cannot be empty"));
    }

    if hostname.len() > 253 {
        return Err(crate::Error::config(format!(
            "hostname too long: {} chars (max 253): {}",
            hostname.len(),
            hostname
        )));
    }

    let name = hostname.strip_suffix('.').unwrap_or(hostname);
    for (index, label) in name.split('.').enumerate() {
        if index == 0 && label == "*" {
            continue;
        }

        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "hostname has empty label: '{}'",
                hostname
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "hostname label too long: {} chars (max 63): '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "hostname label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "hostname label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> ProviderConfig {
        ProviderConfig {
            api_key: "key".to_string(),
            email: "ops@example.com".to_string(),
            zone_id: "zone".to_string(),
        }
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let config = DdnsConfig::new(ProviderConfig::default(), Vec::new());
        let err = config.validate().unwrap_err().to_string();

        assert!(err.contains("api_key"), "{}", err);
        assert!(err.contains("email"), "{}", err);
        assert!(err.contains("zone_id"), "{}", err);
        assert!(err.contains("hostnames"), "{}", err);
    }

    #[test]
    fn complete_config_validates() {
        let config = DdnsConfig::new(
            credentials(),
            vec!["a.example.com".to_string(), "*.example.com".to_string()],
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.record_type(), RecordType::A);
    }

    #[test]
    fn bad_hostname_is_rejected() {
        let config = DdnsConfig::new(credentials(), vec!["-bad.example.com".to_string()]);
        assert!(config.validate().is_err());

        assert!(validate_hostname("a..example.com").is_err());
        assert!(validate_hostname(&"a".repeat(64)).is_err());
        assert!(validate_hostname("a.example.com.").is_ok());
        assert!(validate_hostname("cdn-1.example.com").is_ok());
        assert!(validate_hostname("a_b.example.com").is_err());
        assert!(validate_hostname("_dmarc.example.com").is_err());
    }

    #[test]
    fn measurement_defaults_match_tool_defaults() {
        let measurement = MeasurementConfig::default();

        assert_eq!(measurement.threads, 200);
        assert_eq!(measurement.test_count, 4);
        assert_eq!(measurement.download_count, 10);
        assert_eq!(measurement.download_timeout_secs, 10);
        assert_eq!(measurement.max_latency_ms, 9999);
        assert_eq!(measurement.port, 443);
        assert_eq!(measurement.result_path(), PathBuf::from("/app/result.csv"));
        assert_eq!(measurement.address_list_path(), PathBuf::from("/app/ip.txt"));
    }

    #[test]
    fn packet_loss_out_of_range_is_rejected() {
        let mut measurement = MeasurementConfig::default();
        measurement.max_packet_loss = 1.5;
        assert!(measurement.validate().is_err());
    }

    #[test]
    fn ip_family_parsing() {
        assert_eq!("ipv6".parse::<IpFamily>().unwrap(), IpFamily::Ipv6);
        assert_eq!("IPv4".parse::<IpFamily>().unwrap(), IpFamily::Ipv4);
        assert!("ipx".parse::<IpFamily>().is_err());
        assert_eq!(IpFamily::Ipv6.record_type(), RecordType::Aaaa);
        assert_eq!(IpFamily::Ipv6.address_list_name(), "ipv6.txt");
    }

    #[test]
    fn api_key_not_exposed_in_debug() {
        let debug_str = format!("{:?}", credentials());
        assert!(!debug_str.contains("\"key\""));
        assert!(debug_str.contains("<REDACTED>"));
    }
}
