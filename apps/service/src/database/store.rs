use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Record, RecordKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: RecordKind, id: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: RecordKind, id: String },

    #[error("Database query failed: {0}")]
    Database(#[from] libsql::Error),

    #[error("Connection pool unavailable: {0}")]
    Pool(String),

    #[error("Record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Keyed document storage for users, tokens and checks
///
/// Every operation touches exactly one record and is atomic for that
/// record. Implementations never hold cross-record transactions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a new document, failing with `AlreadyExists` if the key is taken
    async fn create(&self, kind: RecordKind, id: &str, record: &Value) -> Result<(), StoreError>;

    /// Fetch a document, failing with `NotFound` if absent
    async fn read(&self, kind: RecordKind, id: &str) -> Result<Value, StoreError>;

    /// Replace an existing document, failing with `NotFound` if absent
    async fn update(&self, kind: RecordKind, id: &str, record: &Value) -> Result<(), StoreError>;

    /// Remove a document, failing with `NotFound` if absent
    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError>;

    /// All keys of one kind, sorted ascending
    async fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>, StoreError>;
}

/// Typed helpers over [`RecordStore`] for [`Record`] types
#[async_trait]
pub trait RecordStoreExt: RecordStore {
    async fn create_record<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.create(T::KIND, record.key(), &value).await
    }

    async fn read_record<T: Record>(&self, id: &str) -> Result<T, StoreError> {
        let value = self.read(T::KIND, id).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn update_record<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.update(T::KIND, record.key(), &value).await
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}
