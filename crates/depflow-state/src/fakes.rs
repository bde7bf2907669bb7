//! In-memory implementations of the storage traits
//!
//! Provides `MemoryStateStore`, `MemoryReminderStore`, and
//! `MemoryDistributedLock`. They satisfy the trait contracts without any
//! external dependencies and back the test suites and single-process runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// In-memory state store backed by a `HashMap<key, payload>`.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, payload: String) -> StorageResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), payload);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// MemoryReminderStore
// ---------------------------------------------------------------------------

/// In-memory reminder store backed by a `HashMap<name, Reminder>`.
#[derive(Debug, Default)]
pub struct MemoryReminderStore {
    reminders: Mutex<HashMap<String, Reminder>>,
}

impl MemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all registered reminders, sorted.
    pub fn names(&self) -> Vec<String> {
        let reminders = self.reminders.lock().unwrap();
        let mut names: Vec<String> = reminders.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ReminderStore for MemoryReminderStore {
    async fn set(&self, reminder: Reminder) -> StorageResult<()> {
        let mut reminders = self.reminders.lock().unwrap();
        reminders.insert(reminder.name.clone(), reminder);
        Ok(())
    }

    async fn unset(&self, name: &str) -> StorageResult<bool> {
        let mut reminders = self.reminders.lock().unwrap();
        Ok(reminders.remove(name).is_some())
    }

    async fn get(&self, name: &str) -> StorageResult<Option<Reminder>> {
        let reminders = self.reminders.lock().unwrap();
        Ok(reminders.get(name).cloned())
    }

    async fn due(&self, now: DateTime<Utc>) -> StorageResult<Vec<Reminder>> {
        let reminders = self.reminders.lock().unwrap();
        let mut due: Vec<Reminder> = reminders
            .values()
            .filter(|r| r.due_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.name.cmp(&b.name)));
        Ok(due)
    }
}

// ---------------------------------------------------------------------------
// MemoryDistributedLock
// ---------------------------------------------------------------------------

/// Process-local lock table: one async mutex per key. Keys nobody holds or
/// waits on are dropped whenever a lease is requested.
#[derive(Debug, Default)]
pub struct MemoryDistributedLock {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryDistributedLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.retain(|_, slot| Arc::strong_count(slot) > 1);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

#[async_trait]
impl DistributedLock for MemoryDistributedLock {
    async fn acquire(&self, key: &str, timeout: Duration) -> StorageResult<LockLease> {
        let slot = self.slot(key);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(LockLease::new(key, guard)),
            Err(_) => Err(StorageError::LockTimeout {
                key: key.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_state_store_set_get_delete() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "{\"x\":1}".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("{\"x\":1}"));

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_reminder_due_filters_and_orders() {
        let store = MemoryReminderStore::new();
        let now = Utc::now();
        for (name, offset) in [("late", 60), ("early", -120), ("mid", -30)] {
            store
                .set(Reminder {
                    name: name.to_string(),
                    payload: "{}".to_string(),
                    due_at: now + ChronoDuration::seconds(offset),
                })
                .await
                .unwrap();
        }

        let due = store.due(now).await.unwrap();
        let names: Vec<&str> = due.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["early", "mid"]);
    }

    #[tokio::test]
    async fn test_reminder_set_replaces_same_name() {
        let store = MemoryReminderStore::new();
        let now = Utc::now();
        for payload in ["first", "second"] {
            store
                .set(Reminder {
                    name: "check:x".to_string(),
                    payload: payload.to_string(),
                    due_at: now,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.names(), vec!["check:x".to_string()]);
        let reminder = store.get("check:x").await.unwrap().unwrap();
        assert_eq!(reminder.payload, "second");
    }

    #[tokio::test]
    async fn test_lock_times_out_while_held() {
        let lock = MemoryDistributedLock::new();
        let _held = lock.acquire("k", Duration::from_millis(10)).await.unwrap();

        let err = lock
            .acquire("k", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::LockTimeout { .. }));

        // Different keys are independent.
        assert!(lock.acquire("other", Duration::from_millis(10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_released_on_drop() {
        let lock = MemoryDistributedLock::new();
        let lease = lock.acquire("k", Duration::from_millis(10)).await.unwrap();
        drop(lease);
        assert!(lock.acquire("k", Duration::from_millis(10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_table_drops_idle_keys() {
        let lock = MemoryDistributedLock::new();
        let held = lock.acquire("held", Duration::from_millis(10)).await.unwrap();
        for i in 0..3 {
            drop(lock.acquire(&format!("idle-{i}"), Duration::from_millis(10)).await.unwrap());
        }
        let _last = lock.acquire("last", Duration::from_millis(10)).await.unwrap();

        let mut keys: Vec<String> = lock.locks.lock().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["held", "last"]);

        // A held key still blocks after pruning.
        assert!(lock.acquire("held", Duration::from_millis(10)).await.is_err());
        drop(held);
        assert!(lock.acquire("held", Duration::from_millis(10)).await.is_ok());
    }
}
