use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::executor::CheckExecutor;
use super::transition::TransitionDetector;
use super::validation::parse_check;
use crate::database::{RecordStore, StoreError};
use crate::logs::{ExecutionLog, LogEntry};
use crate::models::{CheckState, RecordKind, now_millis};
use crate::notify::{Notifier, alert_message};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler interval must be greater than zero")]
    ZeroInterval,

    #[error("max concurrency must be greater than zero")]
    ZeroConcurrency,
}

/// Timing and capacity of the monitoring loop
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub interval: Duration,
    /// Upper bound on pipelines running at once across all ticks
    pub max_concurrency: usize,
}

/// Ids of checks whose pipeline is still running
#[derive(Clone, Default)]
struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    /// Claim `id`, or `None` if a pipeline for it is already running
    fn try_claim(&self, id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(InFlightGuard { ids: self.ids.clone(), id: id.to_string() })
    }

    fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Releases the claim when the pipeline ends, however it ends
struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

/// What happened to one check during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckReport {
    /// The record could not be read from the store
    ReadFailed { check_id: String, error: String },
    /// The record failed schema validation and was skipped
    Malformed { check_id: String, reason: String },
    /// The new state could not be persisted; no alert was sent
    PersistFailed { check_id: String, error: String },
    /// Probed and persisted; `alerted` is set when a notification was attempted
    Completed { check_id: String, state: CheckState, alerted: bool, alert_error: Option<String> },
    /// The scheduler was torn down before the pipeline could start
    Cancelled { check_id: String },
}

/// Totals for one settled tick
#[derive(Debug, Default)]
pub struct TickSummary {
    pub listed: usize,
    pub skipped_in_flight: usize,
    pub reports: Vec<CheckReport>,
    /// Pipelines that panicked
    pub aborted: usize,
}

impl TickSummary {
    fn count(&self, predicate: impl Fn(&CheckReport) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(r)).count()
    }

    pub fn dispatched(&self) -> usize {
        self.reports.len() + self.aborted
    }

    pub fn completed(&self) -> usize {
        self.count(|r| matches!(r, CheckReport::Completed { .. }))
    }

    pub fn malformed(&self) -> usize {
        self.count(|r| matches!(r, CheckReport::Malformed { .. }))
    }

    pub fn read_failures(&self) -> usize {
        self.count(|r| matches!(r, CheckReport::ReadFailed { .. }))
    }

    pub fn persist_failures(&self) -> usize {
        self.count(|r| matches!(r, CheckReport::PersistFailed { .. }))
    }

    pub fn alerts_sent(&self) -> usize {
        self.count(|r| matches!(r, CheckReport::Completed { alerted: true, alert_error: None, .. }))
    }

    pub fn alert_failures(&self) -> usize {
        self.count(|r| matches!(r, CheckReport::Completed { alert_error: Some(_), .. }))
    }

    fn log(&self) {
        info!(
            listed = self.listed,
            dispatched = self.dispatched(),
            skipped_in_flight = self.skipped_in_flight,
            completed = self.completed(),
            malformed = self.malformed(),
            read_failures = self.read_failures(),
            persist_failures = self.persist_failures(),
            alerts_sent = self.alerts_sent(),
            alert_failures = self.alert_failures(),
            aborted = self.aborted,
            "Tick settled"
        );
    }
}

/// Pipelines dispatched by one tick
///
/// Dropping a `Tick` aborts its pipelines; call [`Tick::settle`] to let
/// them finish.
pub struct Tick {
    pub listed: usize,
    pub skipped_in_flight: usize,
    tasks: JoinSet<CheckReport>,
}

impl Tick {
    pub fn dispatched(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every pipeline of this tick
    pub async fn settle(mut self) -> TickSummary {
        let mut summary = TickSummary {
            listed: self.listed,
            skipped_in_flight: self.skipped_in_flight,
            ..TickSummary::default()
        };

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    error!("Check pipeline aborted: {}", e);
                    summary.aborted += 1;
                }
            }
        }
        summary
    }
}

/// Monitoring scheduler - drives periodic probing of every stored check
pub struct MonitoringScheduler {
    store: Arc<dyn RecordStore>,
    executor: Arc<CheckExecutor>,
    detector: TransitionDetector,
    notifier: Arc<dyn Notifier>,
    execution_log: Arc<ExecutionLog>,
    permits: Arc<Semaphore>,
    in_flight: InFlight,
    interval: Duration,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        settings: SchedulerSettings,
        store: Arc<dyn RecordStore>,
        executor: Arc<CheckExecutor>,
        notifier: Arc<dyn Notifier>,
        execution_log: Arc<ExecutionLog>,
    ) -> Result<Self, SchedulerError> {
        if settings.interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        if settings.max_concurrency == 0 {
            return Err(SchedulerError::ZeroConcurrency);
        }

        Ok(Self {
            detector: TransitionDetector::new(store.clone()),
            store,
            executor,
            notifier,
            execution_log,
            permits: Arc::new(Semaphore::new(settings.max_concurrency)),
            in_flight: InFlight::default(),
            interval: settings.interval,
        })
    }

    /// Number of checks with a running pipeline
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run the timer loop until `shutdown` flips to true
    ///
    /// Each tick runs on its own task, so a slow store or slow probes never
    /// delay the next tick.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let scheduler = self.clone();
                        tokio::spawn(async move {
                            match scheduler.tick().await {
                                Ok(tick) => tick.settle().await.log(),
                                Err(e) => warn!("Skipping tick, could not list checks: {}", e),
                            }
                        });
                    }
                    _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                        info!("Monitoring scheduler stopped");
                        break;
                    }
                }
            }
        })
    }

    /// List all checks and dispatch a pipeline for each one not already in flight
    pub async fn tick(self: &Arc<Self>) -> Result<Tick, StoreError> {
        let ids = self.store.list_ids(RecordKind::Check).await?;

        let mut tick = Tick { listed: ids.len(), skipped_in_flight: 0, tasks: JoinSet::new() };
        for id in ids {
            match self.in_flight.try_claim(&id) {
                Some(claim) => {
                    tick.tasks.spawn(self.clone().run_check(id, claim));
                }
                None => {
                    debug!(check_id = %id, "Previous probe still running, skipping");
                    tick.skipped_in_flight += 1;
                }
            }
        }

        debug!(listed = tick.listed, dispatched = tick.dispatched(), "Tick dispatched");
        Ok(tick)
    }

    /// Wait up to `grace` for running pipelines; true when none remain
    pub async fn drain(&self, grace: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + grace;
        while self.in_flight() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(remaining = self.in_flight(), "Abandoning in-flight checks");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }

    /// probe -> detect -> persist -> notify, strictly in order
    async fn run_check(self: Arc<Self>, check_id: String, _claim: InFlightGuard) -> CheckReport {
        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            return CheckReport::Cancelled { check_id };
        };

        let raw = match self.store.read(RecordKind::Check, &check_id).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(check_id = %check_id, "Could not read check: {}", e);
                return CheckReport::ReadFailed { check_id, error: e.to_string() };
            }
        };

        let check = match parse_check(&check_id, &raw) {
            Ok(check) => check,
            Err(rejection) => {
                warn!(check_id = %check_id, "Skipping malformed check: {}", rejection);
                return CheckReport::Malformed { check_id, reason: rejection.to_string() };
            }
        };

        let outcome = self.executor.execute(&check).await;
        debug!(
            check_id = %check_id,
            status = %outcome.status,
            status_code = ?outcome.status_code,
            latency_ms = outcome.latency_ms,
            "Probe finished"
        );

        let transition = match self.detector.process(check, &outcome).await {
            Ok(transition) => transition,
            Err(e) => {
                error!(check_id = %check_id, "Failed to persist check state, not alerting: {}", e);
                return CheckReport::PersistFailed { check_id, error: e.to_string() };
            }
        };

        let mut alert_error = None;
        if transition.alert_needed {
            let message = alert_message(&transition.check, transition.state());
            match self.notifier.send(&transition.check.user_phone, &message).await {
                Ok(()) => info!(check_id = %check_id, state = %transition.state(), "Alert sent"),
                Err(e) => {
                    warn!(check_id = %check_id, "Alert delivery failed: {}", e);
                    alert_error = Some(e.to_string());
                }
            }
        }

        let entry = LogEntry {
            state: transition.state(),
            alert: transition.alert_needed,
            check: transition.check,
            outcome,
            time: now_millis(),
        };
        if let Err(e) = self.execution_log.append(&check_id, &entry).await {
            warn!(check_id = %check_id, "Failed to append execution log: {}", e);
        }

        CheckReport::Completed {
            check_id,
            state: entry.state,
            alerted: entry.alert,
            alert_error,
        }
    }
}
