//! SurrealDB schema setup for the state and reminder tables

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

/// Initialize all depflow tables in SurrealDB.
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> StorageResult<()> {
    info!("Initializing depflow SurrealDB schema");
    init_state_cache_table(db).await?;
    init_reminders_table(db).await?;
    Ok(())
}

/// Initialize `state_cache`
///
/// Schema:
/// ```text
/// TABLE state_cache {
///   key:         STRING (unique)
///   payload:     STRING (serialized JSON)
///   updated_at:  DATETIME
/// }
/// ```
async fn init_state_cache_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing state_cache table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS state_cache SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS key ON TABLE state_cache TYPE string;
        DEFINE FIELD IF NOT EXISTS payload ON TABLE state_cache TYPE string;
        DEFINE FIELD IF NOT EXISTS updated_at ON TABLE state_cache TYPE datetime;
        DEFINE INDEX IF NOT EXISTS idx_state_key ON TABLE state_cache COLUMNS key UNIQUE;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StorageError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StorageError::SchemaSetup(e.to_string()))?;
    Ok(())
}

/// Initialize `reminders`
///
/// Schema:
/// ```text
/// TABLE reminders {
///   name:     STRING (unique)
///   payload:  STRING (serialized work item)
///   due_at:   DATETIME (indexed)
/// }
/// ```
async fn init_reminders_table(db: &Surreal<Any>) -> StorageResult<()> {
    debug!("Initializing reminders table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS reminders SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS name ON TABLE reminders TYPE string;
        DEFINE FIELD IF NOT EXISTS payload ON TABLE reminders TYPE string;
        DEFINE FIELD IF NOT EXISTS due_at ON TABLE reminders TYPE datetime;
        DEFINE INDEX IF NOT EXISTS idx_reminder_name ON TABLE reminders COLUMNS name UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_reminder_due ON TABLE reminders COLUMNS due_at;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StorageError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StorageError::SchemaSetup(e.to_string()))?;
    Ok(())
}
