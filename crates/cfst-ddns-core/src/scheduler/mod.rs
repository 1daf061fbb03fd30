//! Periodic pass scheduling
//!
//! The Scheduler fires passes on a cron cadence until shutdown. Each pass
//! runs on its own task; overlap is resolved by the runner's single-pass
//! guard (a trigger arriving during a long pass is skipped). A pass that
//! panics is logged and does not stop the schedule.
//!
//! On shutdown, passes already in flight are allowed to finish.

pub mod cron;

pub use cron::CronSchedule;

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::runner::TaskRunner;

/// Cron-driven pass trigger
pub struct Scheduler {
    runner: Arc<TaskRunner>,
    schedule: CronSchedule,
}

impl Scheduler {
    /// Create a scheduler for the given runner
    pub fn new(runner: Arc<TaskRunner>, schedule: CronSchedule) -> Self {
        Self { runner, schedule }
    }

    /// Build a scheduler from the runner's configured cron expression
    ///
    /// # Returns
    ///
    /// - `Ok(None)`: no cron expression configured
    /// - `Err(Error::Config)`: the expression does not parse
    pub fn from_config(runner: Arc<TaskRunner>) -> Result<Option<Self>> {
        let Some(expression) = runner.config().schedule.cron.as_deref() else {
            return Ok(None);
        };
        let schedule = CronSchedule::parse(expression)?;
        Ok(Some(Self::new(runner, schedule)))
    }

    /// The schedule passes fire on
    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    /// Run until SIGINT
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` resolves
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(Some(shutdown_rx)).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        info!("Scheduler started with cron expression '{}'", self.schedule);

        let mut passes = JoinSet::new();
        let mut last_fired: Option<DateTime<Local>> = None;

        loop {
            let now = Local::now();
            // Never fire the same slot twice if the timer wakes a little early
            let from = match last_fired {
                Some(fired) if fired > now => fired,
                _ => now,
            };
            let next = self.schedule.next_after(&from).ok_or_else(|| {
                Error::config(format!(
                    "cron expression '{}' has no upcoming fire time",
                    self.schedule
                ))
            })?;
            let wait = (next - now).to_std().unwrap_or_default();
            info!("Next pass scheduled at {}", next.format("%Y-%m-%d %H:%M:%S %Z"));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_fired = Some(next);
                    let runner = Arc::clone(&self.runner);
                    passes.spawn(async move {
                        runner.run_pass().await;
                    });
                }

                Some(joined) = passes.join_next() => {
                    if let Err(e) = joined {
                        error!("Scheduled pass terminated abnormally: {}", e);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if !passes.is_empty() {
            info!("Waiting for {} in-flight pass(es) to finish", passes.len());
        }
        while let Some(joined) = passes.join_next().await {
            if let Err(e) = joined {
                error!("Scheduled pass terminated abnormally: {}", e);
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }
}
