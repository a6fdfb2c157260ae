//! The per-tab poll state store.
//!
//! A [`PollStore`] owns this tab's in-memory snapshot of every poll it has
//! touched, writes each mutation through to the shared [`BackingStore`], and
//! notifies subscribers over three paths: the same-tab publish done by every
//! mutation, the backing store's change signal for writes made by other
//! tabs, and a periodic re-read that catches anything both of those missed.
//!
//! Tabs never coordinate. Two tabs voting at once each increment their own
//! copy and the later write wins, so one of the two votes is lost. There is
//! no cross-tab lock to prevent that at this layer.

pub mod bus;


use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::codec;
use crate::config::Config;
use crate::models::{seed, PollDefinition, PollSnapshot, PollUpdate, UpdateSource};
use crate::storage::{BackingStore, StorageError, TabId};
use crate::tasks::delivery;

pub use bus::{Callback, ChangeBus, Subscription};

#[derive(Error, Debug)]
pub enum PollStoreError {
    /// The mutation was applied in memory and published to this tab, but
    /// could not be persisted, so other tabs will not see it.
    #[error("could not persist poll '{poll_id}': {source}")]
    BackingStoreUnavailable {
        poll_id: String,
        snapshot: Box<PollSnapshot>,
        #[source]
        source: StorageError,
    },
}

impl PollStoreError {
    /// The in-memory snapshot as it stands after the failed write.
    pub fn snapshot(&self) -> &PollSnapshot {
        match self {
            PollStoreError::BackingStoreUnavailable { snapshot, .. } => snapshot,
        }
    }
}

pub struct PollStore {
    tab: TabId,
    config: Config,
    backing: Arc<dyn BackingStore>,
    cache: Mutex<HashMap<String, PollSnapshot>>,
    bus: Arc<ChangeBus>,
}

impl PollStore {
    pub fn new(backing: Arc<dyn BackingStore>, config: Config) -> Arc<Self> {
        let tab = TabId::new();
        info!("Poll store ready for tab {}", tab);
        Arc::new(Self {
            tab,
            config,
            backing,
            cache: Mutex::new(HashMap::new()),
            bus: Arc::new(ChangeBus::new()),
        })
    }

    pub fn tab_id(&self) -> TabId {
        self.tab
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    // Durable value for `poll_id`, or its seed when absent or unreadable.
    async fn load_durable(&self, poll_id: &str) -> PollSnapshot {
        let key = self.config.storage_key(poll_id);
        match self.backing.get(&key).await {
            Ok(Some(raw)) => match codec::decode(&raw) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Ignoring stored value for poll '{}': {}", poll_id, e);
                    seed::seed_snapshot(poll_id)
                }
            },
            Ok(None) => seed::seed_snapshot(poll_id),
            Err(e) => {
                warn!("Failed to read poll '{}' from storage: {}", poll_id, e);
                seed::seed_snapshot(poll_id)
            }
        }
    }

    async fn hydrate<'a>(
        &self,
        cache: &'a mut HashMap<String, PollSnapshot>,
        poll_id: &str,
    ) -> &'a mut PollSnapshot {
        match cache.entry(poll_id.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Hydrating poll '{}'", poll_id);
                entry.insert(self.load_durable(poll_id).await)
            }
        }
    }

    async fn persist(&self, poll_id: &str, snapshot: &PollSnapshot) -> Result<(), PollStoreError> {
        let key = self.config.storage_key(poll_id);
        self.backing
            .set(self.tab, &key, &codec::encode(snapshot))
            .await
            .map_err(|source| error_for(poll_id, snapshot, source))
    }

    fn publish_local(&self, poll_id: &str, snapshot: &PollSnapshot) {
        self.bus.publish(&PollUpdate {
            poll_id: poll_id.to_string(),
            snapshot: snapshot.clone(),
            source: UpdateSource::Local,
        });
    }

    /// Current snapshot of `poll_id`. The first call per poll reads the
    /// backing store; later calls are served from memory.
    pub async fn get_snapshot(&self, poll_id: &str) -> PollSnapshot {
        let mut cache = self.cache.lock().await;
        self.hydrate(&mut cache, poll_id).await.clone()
    }

    /// Adds one vote to `option_id`. An option the poll does not have is
    /// ignored and the snapshot comes back unchanged, as is a vote on a poll
    /// whose total already sits at `u64::MAX`.
    pub async fn cast_vote(&self, poll_id: &str, option_id: &str) -> Result<PollSnapshot, PollStoreError> {
        let mut cache = self.cache.lock().await;
        let snapshot = self.hydrate(&mut cache, poll_id).await;

        if !snapshot.increment(option_id) {
            debug!("Vote for '{}' in poll '{}' ignored", option_id, poll_id);
            return Ok(snapshot.clone());
        }
        let updated = snapshot.clone();

        // Memory moved either way, so this tab hears about it even if the write failed
        let persisted = self.persist(poll_id, &updated).await;
        self.publish_local(poll_id, &updated);
        drop(cache);

        debug!("Vote recorded for '{}' in poll '{}'", option_id, poll_id);
        persisted.map(|()| updated)
    }

    /// Puts `poll_id` back to its seed options with every tally at zero.
    pub async fn reset_poll(&self, poll_id: &str) -> Result<PollSnapshot, PollStoreError> {
        let mut cache = self.cache.lock().await;
        let fresh = seed::seed_snapshot(poll_id).zeroed();
        cache.insert(poll_id.to_string(), fresh.clone());

        let persisted = self.persist(poll_id, &fresh).await;
        self.publish_local(poll_id, &fresh);
        drop(cache);

        info!("Poll '{}' reset", poll_id);
        persisted.map(|()| fresh)
    }

    /// Deletes every known poll's durable entry, so each one reads as its
    /// seed data again. Every poll is attempted; the first failure is
    /// returned.
    pub async fn reset_all(&self) -> Result<(), PollStoreError> {
        let mut cache = self.cache.lock().await;
        let mut first_error = None;

        for poll in seed::catalogue() {
            let key = self.config.storage_key(poll.id);
            let seeded = poll.seed.clone();
            if let Err(source) = self.backing.remove(self.tab, &key).await {
                warn!("Failed to clear poll '{}': {}", poll.id, source);
                first_error.get_or_insert(error_for(poll.id, &seeded, source));
            }
            cache.insert(poll.id.to_string(), seeded.clone());
            self.publish_local(poll.id, &seeded);
        }
        drop(cache);

        info!("All polls cleared back to seed data");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Current snapshot of every catalogue poll, in catalogue order.
    pub async fn snapshots(&self) -> Vec<(&'static PollDefinition, PollSnapshot)> {
        let mut cache = self.cache.lock().await;
        let mut all = Vec::with_capacity(seed::catalogue().len());
        for poll in seed::catalogue() {
            let snapshot = self.hydrate(&mut cache, poll.id).await.clone();
            all.push((poll, snapshot));
        }
        all
    }

    /// Hydrates the whole catalogue up front so later reads stay in memory.
    pub async fn bootstrap(&self) -> Vec<(&'static PollDefinition, PollSnapshot)> {
        let all = self.snapshots().await;
        for (poll, snapshot) in &all {
            info!(
                "Loaded poll '{}' with {} option(s), {} vote(s)",
                poll.id,
                snapshot.options.len(),
                snapshot.total_votes()
            );
        }
        all
    }

    /// Calls `callback` with every later change to `poll_id`, whichever
    /// path observed it. Must be called from within a tokio runtime: the
    /// first live subscription starts this tab's background delivery.
    pub fn subscribe<F>(self: &Arc<Self>, poll_id: &str, callback: F) -> Subscription
    where
        F: Fn(&PollUpdate) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        self.bus.add(poll_id, callback, || {
            let events = self.backing.watch();
            let weak = Arc::downgrade(self);
            bus::Workers::new(vec![
                tokio::spawn(delivery::follow_change_signal(weak.clone(), events)),
                tokio::spawn(delivery::poll_for_changes(weak, self.config.poll_interval)),
            ])
        })
    }

    /// Replaces memory with the durable value and notifies. For the
    /// polling path nothing happens unless the two differ; a poll this tab
    /// never loaded is simply hydrated.
    pub(crate) async fn reload(&self, poll_id: &str, source: UpdateSource) {
        let mut cache = self.cache.lock().await;
        let durable = self.load_durable(poll_id).await;

        if source == UpdateSource::Polling {
            match cache.get(poll_id) {
                None => {
                    cache.insert(poll_id.to_string(), durable);
                    return;
                }
                Some(current) if *current == durable => return,
                Some(_) => debug!("Poll '{}' drifted from storage, refreshing", poll_id),
            }
        }

        cache.insert(poll_id.to_string(), durable.clone());
        self.bus.publish(&PollUpdate {
            poll_id: poll_id.to_string(),
            snapshot: durable,
            source,
        });
    }
}

fn error_for(poll_id: &str, snapshot: &PollSnapshot, source: StorageError) -> PollStoreError {
    PollStoreError::BackingStoreUnavailable {
        poll_id: poll_id.to_string(),
        snapshot: Box::new(snapshot.clone()),
        source,
    }
}
