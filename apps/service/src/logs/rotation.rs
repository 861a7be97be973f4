//! Periodic rotation of execution logs.
//!
//! Each pass:
//! - moves every live `<id>.log` aside and compresses it into an archive
//! - deletes archives older than the retention window
//!
//! Rotation runs on its own timer and shares nothing with the scheduler
//! beyond the log directory. Moving a live file aside waits for in-flight
//! appends of the same process; a one-shot `rotate-logs` run from another
//! process does not see those appends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{ExecutionLog, LIVE_EXTENSION, LogError, encode_archive};
use crate::models::now_millis;

const STAGING_SUFFIX: &str = ".rotating";
const DAY_MS: i64 = 24 * 3600 * 1000;

/// What one rotation pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Live logs turned into archives
    pub compressed: usize,
    /// Expired archives removed
    pub pruned: usize,
}

/// Log rotation manager
pub struct LogRotation {
    log: Arc<ExecutionLog>,
    /// Days archives are kept; 0 keeps them forever
    archive_retention_days: u64,
}

impl LogRotation {
    pub fn new(log: Arc<ExecutionLog>, archive_retention_days: u64) -> Self {
        Self { log, archive_retention_days }
    }

    /// Compress all live logs, then prune expired archives
    pub async fn rotate(&self) -> Result<RotationReport, LogError> {
        let mut report = RotationReport::default();

        for file_id in self.log.list(false).await? {
            match self.compress_log(&file_id).await {
                Ok(true) => report.compressed += 1,
                Ok(false) => {}
                // One bad file must not stop the others from rotating
                Err(e) => warn!(file_id = %file_id, "Failed to rotate log: {}", e),
            }
        }

        report.pruned = self.prune_archives(now_millis()).await?;

        info!(
            "Log rotation completed: {} logs compressed, {} archives pruned",
            report.compressed, report.pruned
        );
        Ok(report)
    }

    fn staging_path(&self, file_id: &str) -> PathBuf {
        self.log.directory().join(format!("{file_id}{LIVE_EXTENSION}{STAGING_SUFFIX}"))
    }

    /// Archive one live log; returns false when it held nothing
    async fn compress_log(&self, file_id: &str) -> Result<bool, LogError> {
        let staging = self.staging_path(file_id);

        // Leftover from an interrupted pass goes first so the rename below cannot clobber it
        let mut archived = false;
        if tokio::fs::try_exists(&staging).await? {
            archived |= self.archive_staged(file_id, &staging).await?;
        }

        // Appenders opening after the rename start a fresh live file
        self.log.move_aside(file_id, &staging).await?;
        archived |= self.archive_staged(file_id, &staging).await?;
        Ok(archived)
    }

    async fn archive_staged(&self, file_id: &str, staging: &Path) -> Result<bool, LogError> {
        let raw = tokio::fs::read(staging).await?;
        if raw.is_empty() {
            tokio::fs::remove_file(staging).await?;
            return Ok(false);
        }

        let encoded = tokio::task::spawn_blocking(move || encode_archive(&raw)).await??;

        let mut stamp = now_millis();
        loop {
            let path = self.log.archive_path(&format!("{file_id}-{stamp}"));
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    tokio::io::AsyncWriteExt::write_all(&mut file, encoded.as_bytes()).await?;
                    debug!(file_id = %file_id, archive = %path.display(), "Log archived");
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        }

        tokio::fs::remove_file(staging).await?;
        Ok(true)
    }

    /// Remove archives stamped before the retention window
    async fn prune_archives(&self, now_ms: i64) -> Result<usize, LogError> {
        if self.archive_retention_days == 0 {
            return Ok(0);
        }
        let cutoff = now_ms - self.archive_retention_days as i64 * DAY_MS;

        let mut pruned = 0;
        for file_id in self.log.list(true).await? {
            let Some(stamp) = archive_stamp(&file_id) else { continue };
            if stamp < cutoff {
                let path = self.log.archive_path(&file_id);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => pruned += 1,
                    Err(e) => warn!(archive = %path.display(), "Failed to prune archive: {}", e),
                }
            }
        }
        Ok(pruned)
    }

    /// Start the rotation loop; it stops when `shutdown` flips to true
    pub fn start_periodic_rotation(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately; rotation waits a full period
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.rotate().await {
                            warn!("Log rotation failed: {}", e);
                        }
                    }
                    _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                        debug!("Log rotation stopped");
                        break;
                    }
                }
            }
        })
    }
}

/// Millisecond stamp of an archive file id `<check_id>-<millis>`
fn archive_stamp(file_id: &str) -> Option<i64> {
    file_id.rsplit_once('-').and_then(|(_, stamp)| stamp.parse().ok())
}
