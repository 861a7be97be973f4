/// Orchestrator module - coordinates all components
///
/// The orchestrator is the core coordinator that:
/// - Opens the record store and runs migrations
/// - Builds the prober, alert gateway, execution log and scheduler
/// - Runs the monitoring and log rotation loops until shutdown
/// - Drains in-flight checks before returning


use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::accounts::Accounts;
use crate::config::Config;
use crate::database::{LibsqlRecordStore, RecordStore, initialize_database};
use crate::logs::{ExecutionLog, LogRotation};
use crate::models::{Check, RecordKind};
use crate::monitoring::{CheckExecutor, CheckRejection, HttpProber, MonitoringScheduler, Prober, SchedulerSettings, parse_check};
use crate::notify::{LogNotifier, Notifier, TwilioNotifier};
use crate::pool::open_pool;

/// Main orchestrator for the upwatch service
pub struct Orchestrator {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    scheduler: Arc<MonitoringScheduler>,
    rotation: Arc<LogRotation>,
    accounts: Accounts,
}

impl Orchestrator {
    /// Create and run until Ctrl-C
    pub async fn start(config: Config) -> Result<()> {
        let orchestrator = Self::new(config).await?;
        orchestrator
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C, shutting down: {}", e);
                }
            })
            .await
    }

    /// Create a new orchestrator instance over the configured database
    pub async fn new(config: Config) -> Result<Self> {
        let store = open_store(&config).await?;

        let prober: Arc<dyn Prober> = Arc::new(HttpProber::new().context("Failed to build HTTP client")?);

        let notifier: Arc<dyn Notifier> = match &config.twilio {
            Some(twilio) => {
                info!(from = %twilio.from_phone, "Alerts go out through Twilio");
                Arc::new(TwilioNotifier::new(twilio.clone())?)
            }
            None => {
                info!("Twilio is not configured, alerts are only logged");
                Arc::new(LogNotifier)
            }
        };

        Self::with_components(config, store, prober, notifier)
    }

    /// Assemble from already built collaborators
    pub fn with_components(
        config: Config,
        store: Arc<dyn RecordStore>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let execution_log = Arc::new(ExecutionLog::new(&config.logs.directory));
        let scheduler = MonitoringScheduler::new(
            SchedulerSettings {
                interval: Duration::from_secs(config.monitoring.interval_seconds),
                max_concurrency: config.monitoring.max_concurrency,
            },
            store.clone(),
            Arc::new(CheckExecutor::new(prober)),
            notifier,
            execution_log.clone(),
        )?;
        let rotation = LogRotation::new(execution_log, config.logs.archive_retention_days);
        let accounts = Accounts::new(store.clone(), &config.accounts);

        Ok(Self {
            config,
            store,
            scheduler: Arc::new(scheduler),
            rotation: Arc::new(rotation),
            accounts,
        })
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Every stored check, parsed; malformed ones carry their rejection
    pub async fn list_checks(&self) -> Result<Vec<(String, Result<Check, CheckRejection>)>> {
        let mut checks = Vec::new();
        for id in self.store.list_ids(RecordKind::Check).await? {
            let raw = self.store.read(RecordKind::Check, &id).await?;
            let parsed = parse_check(&id, &raw);
            checks.push((id, parsed));
        }
        Ok(checks)
    }

    /// Run the monitoring and rotation loops until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!("Starting upwatch orchestrator...");

        let (stop_tx, stop_rx) = watch::channel(false);
        let scheduler_handle = self.scheduler.clone().spawn(stop_rx.clone());
        let rotation_handle = self
            .rotation
            .clone()
            .start_periodic_rotation(Duration::from_secs(self.config.logs.rotation_interval_seconds), stop_rx);

        info!(
            interval_seconds = self.config.monitoring.interval_seconds,
            max_concurrency = self.config.monitoring.max_concurrency,
            "Monitoring started"
        );

        shutdown.await;
        info!("Shutdown requested, stopping monitoring loops");
        stop_tx.send_replace(true);

        for handle in [scheduler_handle, rotation_handle] {
            if let Err(e) = handle.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }

        let grace = Duration::from_secs(self.config.monitoring.shutdown_grace_seconds);
        if self.scheduler.drain(grace).await {
            info!("All in-flight checks finished");
        } else {
            warn!("Shutdown grace period elapsed with checks still in flight");
        }

        Ok(())
    }
}

/// Open the database, apply migrations and wrap it as a record store
pub async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let pool = open_pool(&config.database.path, config.database.pool_size).await?;

    // Get database connection for initialization
    let conn = pool.get().await.map_err(|e| anyhow!("Failed to get database connection: {e}"))?;

    info!("Initializing database schema...");
    initialize_database(&conn).await?;
    drop(conn);

    Ok(Arc::new(LibsqlRecordStore::new_from_pool(pool)))
}
