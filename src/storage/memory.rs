use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use super::{announce, BackingStore, StorageError, StorageEvent, TabId, SIGNAL_CAPACITY};

/// Non-persistent backing store for tests and throwaway profiles.
///
/// Share one instance (behind an `Arc`) between tabs to give them a common
/// origin. An optional byte quota, counted over keys and values like a
/// browser's local storage, makes writes fail once exceeded.
pub struct InMemoryBackingStore {
    entries: RwLock<HashMap<String, String>>,
    signal: broadcast::Sender<StorageEvent>,
    quota: Option<usize>,
    disabled: AtomicBool,
    signal_enabled: AtomicBool,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        let (signal, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            signal,
            quota: None,
            disabled: AtomicBool::new(false),
            signal_enabled: AtomicBool::new(true),
        }
    }

    pub fn with_quota(limit: usize) -> Self {
        Self {
            quota: Some(limit),
            ..Self::new()
        }
    }

    /// A disabled store refuses every write, like storage switched off by the user.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Writes still land but no change event goes out while muted.
    pub fn set_signal_enabled(&self, enabled: bool) {
        self.signal_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Raw write that bypasses the change signal, the way an out-of-band
    /// writer (another process, a devtools edit) would appear.
    pub fn put_raw(&self, key: &str, value: &str) {
        self.write_entries().insert(key.to_string(), value.to_string());
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, origin: TabId, key: &str, new_value: Option<String>) {
        if !self.signal_enabled.load(Ordering::SeqCst) {
            return;
        }
        announce(
            &self.signal,
            StorageEvent {
                key: key.to_string(),
                new_value,
                origin,
                at: Utc::now(),
            },
        );
    }
}

impl Default for InMemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackingStore for InMemoryBackingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_entries().get(key).cloned())
    }

    async fn set(&self, origin: TabId, key: &str, value: &str) -> Result<(), StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Disabled);
        }

        {
            let mut entries = self.write_entries();
            if let Some(limit) = self.quota {
                let others: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let needed = others + key.len() + value.len();
                if needed > limit {
                    return Err(StorageError::QuotaExceeded {
                        key: key.to_string(),
                        needed,
                        limit,
                    });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }

        self.publish(origin, key, Some(value.to_string()));
        Ok(())
    }

    async fn remove(&self, origin: TabId, key: &str) -> Result<(), StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Disabled);
        }

        let existed = self.write_entries().remove(key).is_some();
        if existed {
            self.publish(origin, key, None);
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<StorageEvent> {
        self.signal.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let store = InMemoryBackingStore::new();
        let tab = TabId::new();

        assert_eq!(store.get("poll_frontend").await.unwrap(), None);
        store.set(tab, "poll_frontend", "{}").await.unwrap();
        assert_eq!(store.get("poll_frontend").await.unwrap().as_deref(), Some("{}"));
        store.remove(tab, "poll_frontend").await.unwrap();
        assert_eq!(store.get("poll_frontend").await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_are_announced_with_their_origin() {
        let store = InMemoryBackingStore::new();
        let mut rx = store.watch();
        let tab = TabId::new();

        store.set(tab, "poll_backend", "v1").await.unwrap();
        store.remove(tab, "poll_backend").await.unwrap();
        // Removing a missing key is silent.
        store.remove(tab, "poll_backend").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.key, "poll_backend");
        assert_eq!(first.new_value.as_deref(), Some("v1"));
        assert_eq!(first.origin, tab);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.new_value, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn quota_counts_keys_and_values() {
        let store = InMemoryBackingStore::with_quota(20);
        let tab = TabId::new();

        store.set(tab, "k", "0123456789").await.unwrap();
        // Overwriting the same key only counts the new value.
        store.set(tab, "k", "0123456789abcdef").await.unwrap();

        let err = store.set(tab, "other", "0123456789").await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 20, .. }));
        assert_eq!(store.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn disabled_store_refuses_writes() {
        let store = InMemoryBackingStore::new();
        store.set_disabled(true);
        assert!(matches!(
            store.set(TabId::new(), "k", "v").await,
            Err(StorageError::Disabled)
        ));
    }

    #[tokio::test]
    async fn muted_signal_still_stores() {
        let store = InMemoryBackingStore::new();
        let mut rx = store.watch();
        store.set_signal_enabled(false);

        store.set(TabId::new(), "k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(rx.try_recv().is_err());
    }
}
