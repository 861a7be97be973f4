/// Record store abstraction layer
///
/// This module provides the keyed document store the monitoring engine and
/// the account services persist through, backed by LibSQL (SQLite).

pub mod migrations;
pub mod repository;
pub mod store;

#[cfg(test)]
pub mod memory;

pub use repository::LibsqlRecordStore;
pub use store::{RecordStore, RecordStoreExt, StoreError};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
