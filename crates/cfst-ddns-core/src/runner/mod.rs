//! Task runner
//!
//! One pass = validate configuration, optionally refresh measurements,
//! reconcile. The runner is the error boundary for a pass: whatever goes
//! wrong is logged and returned as a [`TaskOutcome`], never propagated to
//! the scheduler.
//!
//! Passes are mutually exclusive. A trigger that arrives while a pass is
//! still running is skipped rather than queued.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::reconciler::{PassReport, Reconciler};
use crate::traits::{CandidateSource, DnsRecordClient, SpeedTest};

/// Outcome of one triggered pass
#[derive(Debug)]
pub enum TaskOutcome {
    /// Every hostname was attempted
    Completed(PassReport),
    /// Another pass was still running; nothing was done
    Skipped,
    /// The pass was aborted
    Failed(Error),
}

impl TaskOutcome {
    /// Whether the pass ran and every hostname was written
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed(report) if report.is_complete())
    }
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::Completed(report) => write!(f, "pass completed: {}", report),
            TaskOutcome::Skipped => f.write_str("pass skipped: another pass is still running"),
            TaskOutcome::Failed(e) => write!(f, "pass failed: {}", e),
        }
    }
}

/// Runs reconciliation passes
pub struct TaskRunner {
    /// Immutable configuration
    config: Arc<DdnsConfig>,

    /// Measurement step, if any
    speed_test: Option<Box<dyn SpeedTest>>,

    /// Hostname reconciler
    reconciler: Reconciler,

    /// Held for the duration of a pass
    pass_lock: Mutex<()>,
}

impl TaskRunner {
    /// Create a runner without a measurement step
    pub fn new(
        config: Arc<DdnsConfig>,
        source: Box<dyn CandidateSource>,
        client: Box<dyn DnsRecordClient>,
    ) -> Self {
        let reconciler = Reconciler::new(source, client, config.record_type());
        Self {
            config,
            speed_test: None,
            reconciler,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run `speed_test` before each pass unless measurement is skipped in
    /// the configuration
    pub fn with_speed_test(mut self, speed_test: Box<dyn SpeedTest>) -> Self {
        self.speed_test = Some(speed_test);
        self
    }

    /// Configuration this runner was built with
    pub fn config(&self) -> &DdnsConfig {
        &self.config
    }

    /// Run one pass
    pub async fn run_pass(&self) -> TaskOutcome {
        let Ok(_guard) = self.pass_lock.try_lock() else {
            warn!("Previous pass still running, skipping this trigger");
            return TaskOutcome::Skipped;
        };

        info!("Starting DDNS update pass");

        let outcome = match self.execute().await {
            Ok(report) => TaskOutcome::Completed(report),
            Err(e) => TaskOutcome::Failed(e),
        };

        match &outcome {
            TaskOutcome::Completed(report) if report.is_complete() => info!("{}", outcome),
            TaskOutcome::Completed(_) => warn!("{}", outcome),
            TaskOutcome::Failed(Error::Config(_)) => error!("{} (no network calls made)", outcome),
            TaskOutcome::Failed(e) if e.is_pass_fatal() => {
                error!("{} (no records touched)", outcome);
            }
            TaskOutcome::Failed(_) => error!("{}", outcome),
            TaskOutcome::Skipped => {}
        }

        outcome
    }

    async fn execute(&self) -> Result<PassReport> {
        self.config.validate()?;

        if let Some(speed_test) = &self.speed_test
            && !self.config.measurement.skip
        {
            speed_test.run().await?;
        } else {
            info!("Speed test skipped, using existing results");
        }

        self.reconciler.reconcile(&self.config.hostnames).await
    }
}
