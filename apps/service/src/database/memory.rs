//! In-memory record store and failure-injecting wrapper for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use tokio::sync::RwLock;

use super::store::{RecordStore, StoreError};
use crate::models::RecordKind;

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<(&'static str, String), Value>>,
    failing: Mutex<HashSet<(Op, Option<String>)>>,
}

/// Store operation that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Read,
    Update,
    Delete,
    List,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail for `id`, or for every id when `id` is `None`
    pub fn fail(&self, op: Op, id: Option<&str>) {
        self.failing.lock().unwrap().insert((op, id.map(str::to_string)));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn check(&self, op: Op, id: Option<&str>) -> Result<(), StoreError> {
        let failing = self.failing.lock().unwrap();
        let hit = failing.contains(&(op, None))
            || id.is_some_and(|id| failing.contains(&(op, Some(id.to_string()))));
        if hit {
            Err(StoreError::Pool(format!("injected {op:?} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, kind: RecordKind, id: &str, record: &Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let key = (kind.as_str(), id.to_string());
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind, id: id.to_string() });
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn read(&self, kind: RecordKind, id: &str) -> Result<Value, StoreError> {
        self.check(Op::Read, Some(id))?;
        self.records
            .read()
            .await
            .get(&(kind.as_str(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound { kind, id: id.to_string() })
    }

    async fn update(&self, kind: RecordKind, id: &str, record: &Value) -> Result<(), StoreError> {
        self.check(Op::Update, Some(id))?;
        match self.records.write().await.get_mut(&(kind.as_str(), id.to_string())) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound { kind, id: id.to_string() }),
        }
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        self.check(Op::Delete, Some(id))?;
        self.records
            .write()
            .await
            .remove(&(kind.as_str(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { kind, id: id.to_string() })
    }

    async fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>, StoreError> {
        self.check(Op::List, None)?;
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind.as_str())
            .map(|(_, id)| id.clone())
            .collect())
    }
}
