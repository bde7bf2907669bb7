//! Storage trait definitions for depflow
//!
//! These traits define the core storage abstractions:
//! - `StateStore`: keyed JSON payloads (tracked pull requests, evaluation caches)
//! - `ReminderStore`: named follow-up reminders with a due time
//! - `DistributedLock`: named mutual exclusion across callers
//!
//! All traits are async and backend-agnostic. Typed views (`StateCache`,
//! `ReminderManager`) layer serde on top. In-memory fakes are provided for
//! testing via the `fakes` module.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// StateStore: keyed opaque payloads
// ---------------------------------------------------------------------------

/// Keyed store of serialized state blobs.
///
/// Guarantees:
/// - `set(key, v)` followed by `get(key)` returns `Some(v)`.
/// - `delete(key)` returns `true` only when a value was present.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch the payload stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `payload` under `key`, replacing any previous value.
    async fn set(&self, key: &str, payload: String) -> StorageResult<()>;

    /// Remove the payload under `key`. No-op if absent.
    async fn delete(&self, key: &str) -> StorageResult<bool>;
}

/// Typed view over a [`StateStore`] entry.
///
/// The key is `"{state_name}:{owner_key}"`, so several kinds of state can
/// be kept for one owner (e.g. one pull request updater).
pub struct StateCache<T> {
    store: Arc<dyn StateStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StateCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> StateCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn StateStore>, state_name: &str, owner_key: &str) -> Self {
        Self {
            store,
            key: format!("{state_name}:{owner_key}"),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load and decode the state, `None` when nothing is stored.
    pub async fn try_get_state(&self) -> StorageResult<Option<T>> {
        let Some(payload) = self.store.get(&self.key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                key: self.key.clone(),
                reason: e.to_string(),
            })
    }

    /// Encode and store the state.
    pub async fn set_state(&self, value: &T) -> StorageResult<()> {
        let payload = serde_json::to_string(value).map_err(|e| StorageError::Serialization {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        debug!(key = %self.key, "storing state");
        self.store.set(&self.key, payload).await
    }

    /// Delete the state, returning whether anything was removed.
    pub async fn try_delete(&self) -> StorageResult<bool> {
        self.store.delete(&self.key).await
    }
}

// ---------------------------------------------------------------------------
// ReminderStore: scheduled follow-ups
// ---------------------------------------------------------------------------

/// A named reminder carrying a serialized work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub name: String,
    pub payload: String,
    pub due_at: DateTime<Utc>,
}

/// Store of named reminders. At most one reminder exists per name.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Register `reminder`, replacing any reminder with the same name.
    async fn set(&self, reminder: Reminder) -> StorageResult<()>;

    /// Remove the reminder called `name`. Returns whether one existed.
    async fn unset(&self, name: &str) -> StorageResult<bool>;

    /// Look up a reminder by name.
    async fn get(&self, name: &str) -> StorageResult<Option<Reminder>>;

    /// All reminders due at or before `now`, earliest first.
    async fn due(&self, now: DateTime<Utc>) -> StorageResult<Vec<Reminder>>;
}

/// Typed view over one named reminder.
pub struct ReminderManager<T> {
    store: Arc<dyn ReminderStore>,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ReminderManager<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> ReminderManager<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn ReminderStore>, reminder_name: &str, owner_key: &str) -> Self {
        Self {
            store,
            name: format!("{reminder_name}:{owner_key}"),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedule `item` to fire after `delay`.
    pub async fn set_reminder(&self, item: &T, delay: Duration) -> StorageResult<()> {
        let payload = serde_json::to_string(item).map_err(|e| StorageError::Serialization {
            key: self.name.clone(),
            reason: e.to_string(),
        })?;
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| StorageError::Backend(format!("invalid reminder delay: {e}")))?;
        debug!(reminder = %self.name, delay_secs = delay.num_seconds(), "setting reminder");
        self.store
            .set(Reminder {
                name: self.name.clone(),
                payload,
                due_at: Utc::now() + delay,
            })
            .await
    }

    pub async fn unset_reminder(&self) -> StorageResult<bool> {
        self.store.unset(&self.name).await
    }

    /// Decode the pending reminder, if any, with its due time.
    pub async fn try_get_reminder(&self) -> StorageResult<Option<(T, DateTime<Utc>)>> {
        let Some(reminder) = self.store.get(&self.name).await? else {
            return Ok(None);
        };
        let item = serde_json::from_str(&reminder.payload).map_err(|e| {
            StorageError::Serialization {
                key: self.name.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some((item, reminder.due_at)))
    }
}

// ---------------------------------------------------------------------------
// DistributedLock: named mutual exclusion
// ---------------------------------------------------------------------------

/// A held lock. The lock is released when the lease is dropped.
pub struct LockLease {
    key: String,
    _guard: Box<dyn std::any::Any + Send + Sync>,
}

impl LockLease {
    pub fn new(key: impl Into<String>, guard: impl std::any::Any + Send + Sync) -> Self {
        Self {
            key: key.into(),
            _guard: Box::new(guard),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for LockLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockLease").field("key", &self.key).finish()
    }
}

/// Named lock shared by every caller that can reach the backend.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Wait up to `timeout` for the lock called `key`.
    ///
    /// Returns `StorageError::LockTimeout` when the lock stays held.
    async fn acquire(&self, key: &str, timeout: Duration) -> StorageResult<LockLease>;
}

/// Run `action` while holding the lock called `key`.
///
/// The lease is dropped when `action` completes, whether it succeeded or not.
pub async fn run_with_lock<F, T, E>(
    lock: &dyn DistributedLock,
    key: &str,
    timeout: Duration,
    action: F,
) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: From<StorageError>,
{
    let lease = lock.acquire(key, timeout).await?;
    debug!(lock = %lease.key(), "lock acquired");
    let result = action.await;
    drop(lease);
    debug!(lock = %key, "lock released");
    result
}
