//! Per-check execution logs.
//!
//! Every completed probe appends one JSON line to `<dir>/<check_id>.log`.
//! [`rotation`] periodically compresses live logs into
//! `<check_id>-<millis>.gz.b64` archives and prunes old archives.

pub mod rotation;

pub use rotation::{LogRotation, RotationReport};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::models::{Check, CheckState};
use crate::monitoring::types::Outcome;

const LIVE_EXTENSION: &str = ".log";
const ARCHIVE_EXTENSION: &str = ".gz.b64";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("log entry could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("archive is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("invalid log file id '{0}'")]
    InvalidFileId(String),

    #[error("compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One line of a check's execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub check: Check,
    pub outcome: Outcome,
    pub state: CheckState,
    pub alert: bool,
    /// Unix milliseconds when the entry was written
    pub time: i64,
}

/// Append-only execution log directory
pub struct ExecutionLog {
    dir: PathBuf,
    /// Appends hold it shared while their file handle is open; rotation
    /// takes it exclusively to move a live file aside
    staging: RwLock<()>,
}

impl ExecutionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), staging: RwLock::new(()) }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn live_path(&self, file_id: &str) -> PathBuf {
        self.dir.join(format!("{file_id}{LIVE_EXTENSION}"))
    }

    fn archive_path(&self, file_id: &str) -> PathBuf {
        self.dir.join(format!("{file_id}{ARCHIVE_EXTENSION}"))
    }

    /// Append one entry as a single JSON line
    pub async fn append(&self, file_id: &str, entry: &LogEntry) -> Result<(), LogError> {
        validate_file_id(file_id)?;
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        tokio::fs::create_dir_all(&self.dir).await?;
        let _staging = self.staging.read().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.live_path(file_id))
            .await?;
        // One write per line keeps concurrent appends from interleaving
        file.write_all(&line).await?;
        Ok(())
    }

    /// Rename a live log once no append holds it open
    async fn move_aside(&self, file_id: &str, to: &Path) -> std::io::Result<()> {
        let _staging = self.staging.write().await;
        tokio::fs::rename(self.live_path(file_id), to).await
    }

    /// File ids of live logs, and of archives when `include_archives` is set
    pub async fn list(&self, include_archives: bool) -> Result<Vec<String>, LogError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(id) = name.strip_suffix(LIVE_EXTENSION) {
                ids.push(id.to_string());
            } else if let Some(id) = name.strip_suffix(ARCHIVE_EXTENSION)
                && include_archives
            {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Contents of a live log
    pub async fn read_live(&self, file_id: &str) -> Result<String, LogError> {
        validate_file_id(file_id)?;
        Ok(tokio::fs::read_to_string(self.live_path(file_id)).await?)
    }

    /// Decoded contents of an archive
    pub async fn decompress(&self, file_id: &str) -> Result<String, LogError> {
        validate_file_id(file_id)?;
        let encoded = tokio::fs::read_to_string(self.archive_path(file_id)).await?;
        let text = tokio::task::spawn_blocking(move || decode_archive(&encoded)).await??;
        Ok(text)
    }

    /// Text of a live log or an archive, told apart by the `-<millis>` suffix
    pub async fn read(&self, file_id: &str) -> Result<String, LogError> {
        if file_id.contains('-') { self.decompress(file_id).await } else { self.read_live(file_id).await }
    }
}

/// File ids are check ids, optionally suffixed with `-<millis>`
fn validate_file_id(file_id: &str) -> Result<(), LogError> {
    let valid = !file_id.is_empty()
        && file_id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid { Ok(()) } else { Err(LogError::InvalidFileId(file_id.to_string())) }
}

/// gzip then base64
pub(crate) fn encode_archive(raw: &[u8]) -> Result<String, LogError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    Ok(STANDARD.encode(encoder.finish()?))
}

pub(crate) fn decode_archive(encoded: &str) -> Result<String, LogError> {
    let compressed = STANDARD.decode(encoded.trim())?;
    let mut text = String::new();
    GzDecoder::new(compressed.as_slice()).read_to_string(&mut text)?;
    Ok(text)
}
