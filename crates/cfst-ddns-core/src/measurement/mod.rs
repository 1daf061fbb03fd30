// # CloudflareST Measurement Step
//
// Runs the external speed-test executable as a child process and waits for
// it to write the ranked results file.
//
// A missing executable is a measurement error unless an installer is
// attached, in which case it is fetched first (see `install`).

mod install;

pub use install::CfstInstaller;

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::MeasurementConfig;
use crate::error::{Error, Result};
use crate::traits::SpeedTest;

/// Speed test backed by the CloudflareST executable
#[derive(Debug, Clone)]
pub struct CfstCommand {
    executable: PathBuf,
    result_path: PathBuf,
    args: Vec<String>,
    installer: Option<CfstInstaller>,
}

impl CfstCommand {
    /// Build the command line from configuration
    pub fn new(config: &MeasurementConfig) -> Self {
        Self {
            executable: config.executable_path(),
            result_path: config.result_path(),
            args: build_args(config),
            installer: None,
        }
    }

    /// Fetch the executable with `installer` when it is missing
    pub fn with_installer(mut self, installer: CfstInstaller) -> Self {
        self.installer = Some(installer);
        self
    }

    /// Arguments passed to the executable
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

fn build_args(config: &MeasurementConfig) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        config.address_list_path().display().to_string(),
        "-o".to_string(),
        config.result_path().display().to_string(),
        "-p".to_string(),
        config.download_count.to_string(),
        "-n".to_string(),
        config.threads.to_string(),
        "-t".to_string(),
        config.test_count.to_string(),
        "-sl".to_string(),
        format!("{:.2}", config.min_download_speed),
        "-tl".to_string(),
        config.max_latency_ms.to_string(),
        "-tll".to_string(),
        config.min_latency_ms.to_string(),
        "-tlr".to_string(),
        format!("{:.2}", config.max_packet_loss),
        "-dt".to_string(),
        config.download_timeout_secs.to_string(),
        "-tp".to_string(),
        config.port.to_string(),
    ];

    if let Some(url) = config.url.as_deref().filter(|url| !url.is_empty()) {
        args.push("-url".to_string());
        args.push(url.to_string());
    }

    args
}

#[async_trait]
impl SpeedTest for CfstCommand {
    async fn run(&self) -> Result<()> {
        if let Some(installer) = &self.installer {
            installer.ensure_installed().await?;
        }

        if !tokio::fs::try_exists(&self.executable).await.unwrap_or(false) {
            return Err(Error::measurement(format!(
                "speed-test executable not found at {}",
                self.executable.display()
            )));
        }

        // A stale file from a previous run must not be mistaken for fresh results
        match tokio::fs::remove_file(&self.result_path).await {
            Ok(()) => debug!("Removed previous results file {}", self.result_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(
            "Running speed test: {} {}",
            self.executable.display(),
            self.args.join(" ")
        );

        let output = Command::new(&self.executable)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::measurement(format!("failed to start speed test: {}", e)))?;

        if !output.status.success() {
            return Err(Error::measurement(format!(
                "speed test exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!("Speed test output:\n{}", String::from_utf8_lossy(&output.stdout));

        if !tokio::fs::try_exists(&self.result_path).await.unwrap_or(false) {
            return Err(Error::measurement(format!(
                "speed test finished without writing {}",
                self.result_path.display()
            )));
        }

        info!("Speed test finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_configuration() {
        let mut config = MeasurementConfig::default();
        config.url = Some("https://speed.example.com/100mb".to_string());

        let command = CfstCommand::new(&config);
        let args = command.args().join(" ");

        assert!(args.starts_with("-f /app/ip.txt -o /app/result.csv"), "{}", args);
        assert!(args.contains("-p 10 -n 200 -t 4"), "{}", args);
        assert!(args.contains("-sl 0.00 -tl 9999 -tll 0 -tlr 1.00"), "{}", args);
        assert!(args.contains("-dt 10 -tp 443"), "{}", args);
        assert!(args.ends_with("-url https://speed.example.com/100mb"), "{}", args);
    }

    #[test]
    fn url_is_optional() {
        let command = CfstCommand::new(&MeasurementConfig::default());
        assert!(!command.args().iter().any(|arg| arg == "-url"));
    }

    #[tokio::test]
    async fn missing_executable_fails_without_touching_results() {
        let dir = tempfile::tempdir().unwrap();
        let result = dir.path().join("result.csv");
        std::fs::write(&result, "header\n1.1.1.1\n").unwrap();

        let config = MeasurementConfig {
            work_dir: dir.path().to_path_buf(),
            ..MeasurementConfig::default()
        };

        let err = CfstCommand::new(&config).run().await.unwrap_err();

        assert!(matches!(err, Error::Measurement(_)), "{}", err);
        assert!(result.exists());
    }
}
