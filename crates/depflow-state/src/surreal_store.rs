//! SurrealDB-backed `StateStore` and `ReminderStore`
//!
//! Payloads are stored as serialized JSON strings so callers keep full
//! control over their record shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::migrations;
use crate::storage_traits::{Reminder, ReminderStore, StateStore, StorageResult};

/// Connection settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Engine endpoint, e.g. `mem://`, `surrealkv://path`, `ws://host:8000`
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "depflow".to_string(),
            database: "main".to_string(),
        }
    }
}

impl StoreConfig {
    /// Read `SURREALDB_URL`, `SURREALDB_NAMESPACE`, `SURREALDB_DATABASE`,
    /// falling back to an in-memory engine.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("SURREALDB_URL").unwrap_or(defaults.endpoint),
            namespace: std::env::var("SURREALDB_NAMESPACE").unwrap_or(defaults.namespace),
            database: std::env::var("SURREALDB_DATABASE").unwrap_or(defaults.database),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateRow {
    key: String,
    payload: String,
    updated_at: SurrealDatetime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReminderRow {
    name: String,
    payload: String,
    due_at: SurrealDatetime,
}

impl From<ReminderRow> for Reminder {
    fn from(row: ReminderRow) -> Self {
        Reminder {
            name: row.name,
            payload: row.payload,
            due_at: DateTime::from(row.due_at),
        }
    }
}

/// SurrealDB implementation of [`StateStore`] and [`ReminderStore`].
#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        Self::connect(&StoreConfig::default()).await
    }

    /// Connect using [`StoreConfig::from_env`].
    pub async fn from_env() -> StorageResult<Self> {
        Self::connect(&StoreConfig::from_env()).await
    }

    pub async fn connect(config: &StoreConfig) -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect(config.endpoint.as_str())
            .await
            .map_err(|e| StorageError::Backend(format!("connect {}: {e}", config.endpoint)))?;

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        migrations::init_schema(&db).await?;

        info!(endpoint = %config.endpoint, "SurrealStore connected");
        Ok(Self { db })
    }
}

#[async_trait]
impl StateStore for SurrealStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut res = self
            .db
            .query("SELECT * FROM state_cache WHERE key = $key")
            .bind(("key", key.to_string()))
            .await?;

        let rows: Vec<StateRow> = res.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.payload))
    }

    async fn set(&self, key: &str, payload: String) -> StorageResult<()> {
        debug!(key = %key, "writing state row");
        let row = StateRow {
            key: key.to_string(),
            payload,
            updated_at: SurrealDatetime::from(Utc::now()),
        };

        self.db
            .query("DELETE FROM state_cache WHERE key = $key; CREATE state_cache CONTENT $row;")
            .bind(("key", key.to_string()))
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut res = self
            .db
            .query("DELETE FROM state_cache WHERE key = $key RETURN BEFORE")
            .bind(("key", key.to_string()))
            .await?;

        let removed: Vec<StateRow> = res.take(0)?;
        Ok(!removed.is_empty())
    }
}

#[async_trait]
impl ReminderStore for SurrealStore {
    async fn set(&self, reminder: Reminder) -> StorageResult<()> {
        debug!(reminder = %reminder.name, due_at = %reminder.due_at, "writing reminder row");
        let name = reminder.name.clone();
        let row = ReminderRow {
            name: reminder.name,
            payload: reminder.payload,
            due_at: SurrealDatetime::from(reminder.due_at),
        };

        self.db
            .query("DELETE FROM reminders WHERE name = $name; CREATE reminders CONTENT $row;")
            .bind(("name", name))
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    async fn unset(&self, name: &str) -> StorageResult<bool> {
        let mut res = self
            .db
            .query("DELETE FROM reminders WHERE name = $name RETURN BEFORE")
            .bind(("name", name.to_string()))
            .await?;

        let removed: Vec<ReminderRow> = res.take(0)?;
        Ok(!removed.is_empty())
    }

    async fn get(&self, name: &str) -> StorageResult<Option<Reminder>> {
        let mut res = self
            .db
            .query("SELECT * FROM reminders WHERE name = $name")
            .bind(("name", name.to_string()))
            .await?;

        let rows: Vec<ReminderRow> = res.take(0)?;
        Ok(rows.into_iter().next().map(Reminder::from))
    }

    async fn due(&self, now: DateTime<Utc>) -> StorageResult<Vec<Reminder>> {
        let mut res = self
            .db
            .query("SELECT * FROM reminders WHERE due_at <= $now ORDER BY due_at ASC")
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let rows: Vec<ReminderRow> = res.take(0)?;
        Ok(rows.into_iter().map(Reminder::from).collect())
    }
}
