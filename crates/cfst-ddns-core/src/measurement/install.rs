// # Speed-Test Tool Provisioning
//
// Fetches the CloudflareST executable from the latest published release
// when it is not present in the working directory.
//
// ## Steps
//
// 1. GET the release metadata (`assets[].name`, `assets[].browser_download_url`)
// 2. Pick the first asset whose name contains `linux_{arch}` and ends in `.tar.gz`
// 3. Download it and unpack every regular file directly into the working
//    directory (directory components are dropped)
// 4. Mark the executable `0755`

use flate2::read::GzDecoder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MeasurementConfig;
use crate::error::{Error, Result};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

// The release API rejects requests without a user agent
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

/// Downloads and unpacks the speed-test executable
#[derive(Debug, Clone)]
pub struct CfstInstaller {
    client: reqwest::Client,
    release_url: String,
    work_dir: PathBuf,
    executable: PathBuf,
    arch: Option<String>,
}

impl CfstInstaller {
    /// Create an installer for the configured working directory
    ///
    /// # Errors
    ///
    /// - `Error::Http` if the HTTP client cannot be built
    pub fn new(config: &MeasurementConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            release_url: config.release_url.clone(),
            work_dir: config.work_dir.clone(),
            executable: config.executable_path(),
            arch: None,
        })
    }

    /// Select assets for `arch` instead of the host architecture
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = Some(arch.into());
        self
    }

    /// Install the executable unless it already exists
    pub async fn ensure_installed(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.executable).await.unwrap_or(false) {
            debug!("Speed-test executable present at {}", self.executable.display());
            return Ok(());
        }
        self.install().await
    }

    /// Download the latest release and unpack it into the working directory
    pub async fn install(&self) -> Result<()> {
        let arch = match &self.arch {
            Some(arch) => arch.clone(),
            None => host_arch()?.to_string(),
        };

        let release: Release = self
            .fetch(&self.release_url)
            .await?
            .json()
            .await
            .map_err(|e| install_error(format!("invalid release metadata: {}", e)))?;

        let asset = select_asset(&release.assets, &arch)
            .ok_or_else(|| install_error(format!("no linux_{} .tar.gz asset in the latest release", arch)))?;

        info!("Downloading speed-test tool from {}", asset.browser_download_url);
        let archive = self
            .fetch(&asset.browser_download_url)
            .await?
            .bytes()
            .await
            .map_err(|e| install_error(format!("download interrupted: {}", e)))?;

        tokio::fs::create_dir_all(&self.work_dir).await?;

        let work_dir = self.work_dir.clone();
        let unpacked = tokio::task::spawn_blocking(move || unpack_flat(&archive, &work_dir))
            .await
            .map_err(|e| install_error(format!("unpack task failed: {}", e)))??;
        debug!("Unpacked {} file(s) into {}", unpacked, self.work_dir.display());

        if !tokio::fs::try_exists(&self.executable).await.unwrap_or(false) {
            return Err(install_error(format!(
                "archive did not contain {}",
                self.executable.display()
            )));
        }
        make_executable(&self.executable).await?;

        info!("Speed-test tool installed at {}", self.executable.display());
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| install_error(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(install_error(format!("{} returned HTTP {}", url, status)));
        }
        Ok(response)
    }
}

fn install_error(message: String) -> Error {
    Error::measurement(format!("speed-test tool install failed: {}", message))
}

/// Release naming for the running architecture
fn host_arch() -> Result<&'static str> {
    match std::env::consts::ARCH {
        "x86_64" => Ok("amd64"),
        "aarch64" => Ok("arm64"),
        other => Err(install_error(format!("unsupported architecture '{}'", other))),
    }
}

fn select_asset<'a>(assets: &'a [ReleaseAsset], arch: &str) -> Option<&'a ReleaseAsset> {
    let keyword = format!("linux_{}", arch);
    assets.iter().find(|asset| {
        let name = asset.name.to_lowercase();
        name.contains(&keyword) && name.ends_with(".tar.gz")
    })
}

/// Unpack every regular file of a gzip tarball into `dir`, dropping
/// directory components; returns the number of files written
fn unpack_flat(archive: &[u8], dir: &Path) -> Result<usize> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    let mut unpacked = 0;

    for entry in tar
        .entries()
        .map_err(|e| install_error(format!("unreadable archive: {}", e)))?
    {
        let mut entry = entry.map_err(|e| install_error(format!("unreadable archive: {}", e)))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = {
            let path = entry.path()?;
            path.file_name().map(|name| name.to_owned())
        };
        let Some(name) = name else {
            continue;
        };

        entry.unpack(dir.join(&name))?;
        unpacked += 1;
    }

    Ok(unpacked)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
