//! Environment-variable configuration
//!
//! Every setting has a default except the Cloudflare credentials and the
//! hostname list. Missing required values are not rejected here; they are
//! reported together by `DdnsConfig::validate`.

use anyhow::{Context, Result};
use cfst_ddns_core::config::{DdnsConfig, ProviderConfig};
use cfst_ddns_core::IpFamily;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// Everything the daemon reads from its environment
#[derive(Debug)]
pub struct Settings {
    /// Configuration handed to the core library
    pub config: DdnsConfig,
    /// Log verbosity
    pub log_level: Level,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset and blank are treated alike
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = ProviderConfig {
            api_key: get("CF_API_KEY").unwrap_or_default(),
            email: get("CF_EMAIL").unwrap_or_default(),
            zone_id: get("CF_ZONE_ID").unwrap_or_default(),
        };

        let hostnames = get("CF_HOSTNAMES")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let mut config = DdnsConfig::new(provider, hostnames);

        let m = &mut config.measurement;
        if let Some(v) = get("IP_VERSION") {
            m.ip_family = IpFamily::from_str(&v).context("IP_VERSION")?;
        }
        if let Some(v) = get("CFST_DIR") {
            m.work_dir = PathBuf::from(v);
        }
        m.url = get("CFST_URL");
        parse_into(&get, "CFST_PORT", &mut m.port)?;
        parse_into(&get, "CFST_DOWNLOAD_TIMEOUT", &mut m.download_timeout_secs)?;
        parse_into(&get, "CFST_THREADS", &mut m.threads)?;
        parse_into(&get, "CFST_TEST_COUNT", &mut m.test_count)?;
        parse_into(&get, "CFST_DOWNLOAD_COUNT", &mut m.download_count)?;
        parse_into(&get, "CFST_MAX_LATENCY", &mut m.max_latency_ms)?;
        parse_into(&get, "CFST_MIN_LATENCY", &mut m.min_latency_ms)?;
        parse_into(&get, "CFST_MAX_PACKET_LOSS", &mut m.max_packet_loss)?;
        parse_into(&get, "CFST_MIN_DOWNLOAD_SPEED", &mut m.min_download_speed)?;
        if let Some(v) = get("CFST_SKIP") {
            m.skip = parse_bool(&v);
        }
        if let Some(v) = get("CFST_AUTO_INSTALL") {
            m.auto_install = parse_bool(&v);
        }
        if let Some(v) = get("CFST_RELEASE_URL") {
            m.release_url = v;
        }

        config.schedule.cron = get("CRON_SCHEDULE");
        if let Some(v) = get("RUN_ON_STARTUP") {
            config.schedule.run_on_startup = parse_bool(&v);
        }

        config.dry_run = get("DDNS_MODE").is_some_and(|v| v.eq_ignore_ascii_case("dry-run"));

        let log_level = match get("DDNS_LOG_LEVEL") {
            Some(v) => parse_level(&v)?,
            None => Level::INFO,
        };

        Ok(Self { config, log_level })
    }
}

/// Overwrite `target` if `key` is set; a value that does not parse is an error
fn parse_into<T, G>(get: &G, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *target = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a number, got '{}': {}", key, raw, e))?;
    }
    Ok(())
}

/// Truthy values are `true`, `1`, `t`, `y` and `yes` (any case); anything else is false
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "t" | "y" | "yes"
    )
}

fn parse_level(value: &str) -> Result<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}
