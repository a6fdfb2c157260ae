//! The origin-scoped key-value substrate shared by every tab.
//!
//! A [`BackingStore`] is synchronous from the caller's point of view: each
//! call completes or fails on its own, nothing is queued. Every successful
//! `set`/`remove` is announced on the store's change signal together with the
//! identity of the tab that made it, so tabs can skip their own writes the
//! way a browser's `storage` event never fires in the writing tab.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use memory::InMemoryBackingStore;

/// Capacity of the change-signal channel. Slow tabs that lag past this
/// simply miss events and catch up through polling.
pub const SIGNAL_CAPACITY: usize = 256;

/// Identity of one tab (one independent client actor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A change to one key, as seen on the native change signal.
#[derive(Debug, Clone)]
pub struct StorageEvent {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<String>,
    pub origin: TabId,
    pub at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage quota exceeded: writing '{key}' needs {needed} bytes, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("storage is disabled")]
    Disabled,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, origin: TabId, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, origin: TabId, key: &str) -> Result<(), StorageError>;

    /// Subscribe to the change signal. Events from every tab are delivered,
    /// including the subscriber's own; filtering is the receiver's job.
    fn watch(&self) -> broadcast::Receiver<StorageEvent>;
}

/// Publishes `event` to whoever is watching. No watchers is not an error.
pub(crate) fn announce(signal: &broadcast::Sender<StorageEvent>, event: StorageEvent) {
    let _ = signal.send(event);
}
