// # cfst-ddns-core
//
// Core library for the measurement-driven DDNS updater.
//
// ## Architecture Overview
//
// This library turns "N hostnames need addresses" plus "a ranked list of
// measured endpoints" into idempotent DNS record writes:
// - **CandidateSource**: Ranked endpoints (the speed-test results file)
// - **DnsRecordClient**: Lookup and create/update of A/AAAA records
// - **SpeedTest**: Optional measurement step refreshing the candidates,
//   with opt-in provisioning of the tool itself
// - **Reconciler**: Binds the i-th hostname to the i-th candidate and upserts
// - **TaskRunner**: One guarded, validated pass with an error boundary
// - **Scheduler**: Cron-driven pass trigger
//
// ## Design Principles
//
// 1. **Explicit configuration**: An immutable `DdnsConfig` is passed in;
//    nothing reads process globals
// 2. **All or nothing binding**: Too few candidates means zero writes
// 3. **Best-effort batch**: One hostname failing never blocks the next
// 4. **No hidden retries**: The next scheduled pass is the retry
// 5. **One pass at a time**: Overlapping triggers are skipped

pub mod traits;
pub mod candidates;
pub mod measurement;
pub mod reconciler;
pub mod runner;
pub mod scheduler;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{CandidateSource, DnsRecordClient, SpeedTest};
pub use candidates::ResultFileReader;
pub use measurement::{CfstCommand, CfstInstaller};
pub use reconciler::{PassReport, Reconciler};
pub use runner::{TaskOutcome, TaskRunner};
pub use scheduler::{CronSchedule, Scheduler};
pub use config::{DdnsConfig, IpFamily, MeasurementConfig, ProviderConfig, ScheduleConfig};
pub use error::{Error, Result};
