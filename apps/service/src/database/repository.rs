use async_trait::async_trait;
use libsql::params;
use serde_json::Value;

use super::store::{RecordStore, StoreError};
use crate::models::{RecordKind, now_millis};
use crate::pool::{LibsqlManager, LibsqlPool};

/// LibSQL-backed record store
///
/// Documents live in a single `records` table keyed by `(kind, id)`, each
/// write being one statement.
pub struct LibsqlRecordStore {
    pool: LibsqlPool,
}

impl LibsqlRecordStore {
    /// Create a new record store from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for LibsqlRecordStore {
    async fn create(&self, kind: RecordKind, id: &str, record: &Value) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;

        let inserted = conn
            .execute(
                "INSERT INTO records (kind, id, body, updated_at) VALUES (?, ?, ?, ?) ON CONFLICT (kind, id) DO NOTHING",
                params![kind.as_str(), id.to_string(), body, now_millis()],
            )
            .await?;

        if inserted == 0 {
            return Err(StoreError::AlreadyExists { kind, id: id.to_string() });
        }
        Ok(())
    }

    async fn read(&self, kind: RecordKind, id: &str) -> Result<Value, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE kind = ? AND id = ?",
                params![kind.as_str(), id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(serde_json::from_str(&body)?)
            }
            None => Err(StoreError::NotFound { kind, id: id.to_string() }),
        }
    }

    async fn update(&self, kind: RecordKind, id: &str, record: &Value) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;

        let updated = conn
            .execute(
                "UPDATE records SET body = ?, updated_at = ? WHERE kind = ? AND id = ?",
                params![body, now_millis(), kind.as_str(), id.to_string()],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound { kind, id: id.to_string() });
        }
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;

        let deleted = conn
            .execute(
                "DELETE FROM records WHERE kind = ? AND id = ?",
                params![kind.as_str(), id.to_string()],
            )
            .await?;

        if deleted == 0 {
            return Err(StoreError::NotFound { kind, id: id.to_string() });
        }
        Ok(())
    }

    async fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id FROM records WHERE kind = ? ORDER BY id", params![kind.as_str()])
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::RecordStoreExt;
    use crate::models::{Check, CheckState, HttpMethod, Protocol};
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_test_store() -> anyhow::Result<(LibsqlRecordStore, TempDir)> {
        let temp_dir = tempfile::tempdir()?;
        let db_path = temp_dir.path().join("test.db");
        let pool = crate::pool::open_pool(&db_path, 4).await?;
        let conn = pool.get().await?;
        crate::database::initialize_database(&conn).await?;
        drop(conn);
        Ok((LibsqlRecordStore::new_from_pool(pool), temp_dir))
    }

    #[tokio::test]
    async fn test_create_read_update_delete() -> anyhow::Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.create(RecordKind::User, "5551234567", &json!({"phone": "5551234567"})).await?;
        let read = store.read(RecordKind::User, "5551234567").await?;
        assert_eq!(read["phone"], "5551234567");

        store.update(RecordKind::User, "5551234567", &json!({"phone": "5551234567", "checks": ["a"]})).await?;
        let read = store.read(RecordKind::User, "5551234567").await?;
        assert_eq!(read["checks"], json!(["a"]));

        store.delete(RecordKind::User, "5551234567").await?;
        assert!(store.read(RecordKind::User, "5551234567").await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_rejects_existing_key() -> anyhow::Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.create(RecordKind::Token, "t1", &json!({"v": 1})).await?;
        let err = store.create(RecordKind::Token, "t1", &json!({"v": 2})).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        // The original document is untouched
        assert_eq!(store.read(RecordKind::Token, "t1").await?["v"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_fail() -> anyhow::Result<()> {
        let (store, _dir) = create_test_store().await?;

        assert!(store.update(RecordKind::Check, "nope", &json!({})).await.unwrap_err().is_not_found());
        assert!(store.delete(RecordKind::Check, "nope").await.unwrap_err().is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_kinds_are_separate_namespaces() -> anyhow::Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.create(RecordKind::Check, "b", &json!({})).await?;
        store.create(RecordKind::Check, "a", &json!({})).await?;
        store.create(RecordKind::Token, "a", &json!({})).await?;

        assert_eq!(store.list_ids(RecordKind::Check).await?, vec!["a", "b"]);
        assert_eq!(store.list_ids(RecordKind::Token).await?, vec!["a"]);
        assert!(store.list_ids(RecordKind::User).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_typed_round_trip() -> anyhow::Result<()> {
        let (store, _dir) = create_test_store().await?;
        let mut check = Check {
            id: "abcdefghij0123456789".into(),
            user_phone: "5551234567".into(),
            protocol: Protocol::Https,
            url: "example.com".into(),
            method: HttpMethod::Get,
            success_codes: vec![200],
            timeout_seconds: 3,
            state: CheckState::Unknown,
            last_checked: None,
        };

        store.create_record(&check).await?;
        check.state = CheckState::Up;
        check.last_checked = Some(42);
        store.update_record(&check).await?;

        let stored: Check = store.read_record(&check.id).await?;
        assert_eq!(stored, check);
        Ok(())
    }
}
