// # cfst-ddnsd - Measurement-Driven DDNS Daemon
//
// Thin integration layer: all reconciliation logic lives in cfst-ddns-core.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the results file, the speed-test tool and the Cloudflare client
//    into a TaskRunner
// 4. Running one pass (`--run-task`) or the startup pass plus the cron
//    schedule until SIGTERM/SIGINT
//
// ## Configuration
//
// ### Cloudflare
// - `CF_API_KEY`, `CF_EMAIL`, `CF_ZONE_ID`: Global API key credentials
// - `CF_HOSTNAMES`: Whitespace-separated hostnames to manage
//
// ### Speed Test
// - `IP_VERSION`: ipv4 (default) or ipv6
// - `CFST_DIR`: Directory holding the tool, address lists and results (/app)
// - `CFST_SKIP`: Reuse the existing results file instead of measuring
// - `CFST_AUTO_INSTALL`: Download the tool from the latest release if missing
// - `CFST_RELEASE_URL`: Release metadata endpoint used for the download
// - `CFST_URL`, `CFST_PORT`, `CFST_DOWNLOAD_TIMEOUT`, `CFST_THREADS`,
//   `CFST_TEST_COUNT`, `CFST_DOWNLOAD_COUNT`, `CFST_MAX_LATENCY`,
//   `CFST_MIN_LATENCY`, `CFST_MAX_PACKET_LOSS`, `CFST_MIN_DOWNLOAD_SPEED`
//
// ### Scheduling
// - `CRON_SCHEDULE`: Five-field cron expression; unset means no schedule
// - `RUN_ON_STARTUP`: Run one pass at startup (default true)
//
// An incomplete configuration only stops `--run-task`. In scheduler mode
// the daemon stays up and every pass fails until it is fixed. A malformed
// `CRON_SCHEDULE` is always fatal.
//
// ### Daemon
// - `DDNS_MODE`: `dry-run` to log writes instead of sending them
// - `DDNS_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export CF_API_KEY=your_key
// export CF_EMAIL=you@example.com
// export CF_ZONE_ID=your_zone
// export CF_HOSTNAMES="cdn1.example.com cdn2.example.com"
// export CRON_SCHEDULE="0 */6 * * *"
//
// cfst-ddnsd
// ```

mod env;

use anyhow::Result;
use cfst_ddns_core::{
    CfstCommand, CfstInstaller, DdnsConfig, ResultFileReader, Scheduler, TaskRunner,
};
use cfst_ddns_provider_cloudflare::CloudflareClient;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Update Cloudflare DNS records with the fastest measured endpoints
#[derive(Debug, Parser)]
#[command(name = "cfst-ddnsd", version, about)]
struct Cli {
    /// Run exactly one update pass and exit
    #[arg(long)]
    run_task: bool,

    /// Log record writes instead of sending them
    #[arg(long)]
    dry_run: bool,
}

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (including an incomplete one-shot pass)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment
    let settings = match env::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let mut config = settings.config;
    if cli.dry_run {
        config.dry_run = true;
    }

    if let Some(code) = check_config(&config, cli.run_task) {
        return code.into();
    }

    info!("Starting cfst-ddnsd");
    info!(
        "Configuration loaded: {} hostname(s), {} records{}",
        config.hostnames.len(),
        config.record_type(),
        if config.dry_run { " [DRY-RUN]" } else { "" }
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(cli, config)).into()
}

/// Validate configuration before the runtime starts
///
/// Returns an exit code only when the process should stop: a one-shot run
/// cannot succeed with invalid configuration, a long-running daemon keeps
/// its schedule and reports the error on every pass.
fn check_config(config: &DdnsConfig, one_shot: bool) -> Option<DdnsExitCode> {
    let e = config.validate().err()?;
    if one_shot {
        error!("{}", e);
        return Some(DdnsExitCode::ConfigError);
    }
    warn!("{} (passes will fail until this is fixed)", e);
    None
}

/// Wire the components and run the requested mode
async fn run_daemon(cli: Cli, config: DdnsConfig) -> DdnsExitCode {
    let runner = match build_runner(Arc::new(config)) {
        Ok(runner) => Arc::new(runner),
        Err(e) => {
            error!("Startup error: {}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    if cli.run_task {
        let outcome = runner.run_pass().await;
        return if outcome.is_success() {
            DdnsExitCode::CleanShutdown
        } else {
            DdnsExitCode::RuntimeError
        };
    }

    // Reject a bad cron expression before doing any work
    let scheduler = match Scheduler::from_config(Arc::clone(&runner)) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("{}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!("{}", e);
            return DdnsExitCode::RuntimeError;
        }
    };

    if runner.config().schedule.run_on_startup {
        info!("Running startup pass");
        runner.run_pass().await;
    }

    let Some(scheduler) = scheduler else {
        warn!("CRON_SCHEDULE not set, no periodic updates will run");
        return DdnsExitCode::CleanShutdown;
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let signal = signals.recv().await;
        info!("Received shutdown signal: {}", signal);
        let _ = shutdown_tx.send(());
    });

    match scheduler.run_with_shutdown(shutdown_rx).await {
        Ok(()) => {
            info!("Shutting down daemon");
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Scheduler error: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

fn build_runner(config: Arc<DdnsConfig>) -> Result<TaskRunner> {
    let client = CloudflareClient::new(&config.provider, config.dry_run)?;
    let source = ResultFileReader::new(config.measurement.result_path());
    debug!("Candidates are read from {}", source.path().display());

    let mut speed_test = CfstCommand::new(&config.measurement);
    if config.measurement.auto_install {
        speed_test = speed_test.with_installer(CfstInstaller::new(&config.measurement)?);
    }

    Ok(TaskRunner::new(config, Box::new(source), Box::new(client))
        .with_speed_test(Box::new(speed_test)))
}

/// Shutdown signals (SIGTERM, SIGINT), registered before any pass runs
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for either signal and return its name
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Fallback for non-Unix platforms (SIGINT only)
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    }
}
