/// Monitoring engine module - handles periodic probing of stored checks
///
/// This module is responsible for:
/// - Validating check documents read from the store
/// - Probing targets with a hard per-check timeout
/// - Detecting and persisting state transitions
/// - Scheduling bounded, non-overlapping probe pipelines
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod transition;
pub mod types;
pub mod validation;

pub use checker::{HttpProber, Prober};
pub use executor::CheckExecutor;
pub use scheduler::{CheckReport, MonitoringScheduler, SchedulerSettings, TickSummary};
pub use transition::{Transition, TransitionDetector};
pub use types::{FailureReason, Outcome, OutcomeStatus};
pub use validation::{CheckRejection, parse_check};
