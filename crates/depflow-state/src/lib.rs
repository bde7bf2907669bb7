//! depflow-state: storage primitives for dependency flow orchestration
//!
//! Everything the orchestration core persists goes through three seams:
//!
//! - `StateStore` / `StateCache<T>`: opaque typed state per owner key
//!   (tracked pull requests, merge policy evaluation caches)
//! - `ReminderStore` / `ReminderManager<T>`: delayed follow-up work items
//! - `DistributedLock`: per-updater mutual exclusion
//!
//! In-memory fakes live in [`fakes`]; [`SurrealStore`] persists state and
//! reminders in SurrealDB.

mod error;
pub mod fakes;
mod migrations;
pub mod storage_traits;
pub mod surreal_store;

pub use error::StorageError;
pub use storage_traits::{
    run_with_lock, DistributedLock, LockLease, Reminder, ReminderManager, ReminderStore,
    StateCache, StateStore, StorageResult,
};
pub use surreal_store::{StoreConfig, SurrealStore};
