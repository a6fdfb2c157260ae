//! Per-tab fan-out of poll updates.
//!
//! All three delivery paths (local mutations, the backing store's change
//! signal, the polling fallback) end in [`ChangeBus::publish`], which drops
//! an update whose snapshot equals the last one delivered for that poll.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::debug;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::{PollSnapshot, PollUpdate};

pub type Callback = Arc<dyn Fn(&PollUpdate) + Send + Sync>;

struct Subscriber {
    id: Uuid,
    active: Arc<AtomicBool>,
    callback: Callback,
}

/// Background delivery tasks. Aborted when dropped.
pub(crate) struct Workers(Vec<JoinHandle<()>>);

impl Workers {
    pub(crate) fn new(handles: Vec<JoinHandle<()>>) -> Self {
        Self(handles)
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct BusState {
    subscribers: HashMap<String, Vec<Subscriber>>,
    last_delivered: HashMap<String, PollSnapshot>,
    workers: Option<Workers>,
}

#[derive(Default)]
pub struct ChangeBus {
    state: Mutex<BusState>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `callback` for `poll_id`. `start_workers` runs, under the
    /// bus lock, only when no background delivery is running yet.
    pub(crate) fn add<W>(
        self: &Arc<Self>,
        poll_id: &str,
        callback: Callback,
        start_workers: W,
    ) -> Subscription
    where
        W: FnOnce() -> Workers,
    {
        let id = Uuid::new_v4();
        let active = Arc::new(AtomicBool::new(true));

        let mut state = self.lock();
        if state.workers.is_none() {
            state.workers = Some(start_workers());
        }
        state
            .subscribers
            .entry(poll_id.to_string())
            .or_default()
            .push(Subscriber {
                id,
                active: Arc::clone(&active),
                callback,
            });
        debug!("Subscription {} added for poll '{}'", id, poll_id);

        Subscription {
            id,
            poll_id: poll_id.to_string(),
            active,
            bus: Arc::downgrade(self),
        }
    }

    fn remove(&self, poll_id: &str, id: Uuid) {
        let stopped = {
            let mut state = self.lock();
            if let Some(list) = state.subscribers.get_mut(poll_id) {
                list.retain(|subscriber| subscriber.id != id);
                if list.is_empty() {
                    state.subscribers.remove(poll_id);
                    state.last_delivered.remove(poll_id);
                }
            }
            if state.subscribers.is_empty() {
                state.workers.take()
            } else {
                None
            }
        };

        debug!("Subscription {} removed from poll '{}'", id, poll_id);
        if stopped.is_some() {
            debug!("Last subscription gone, stopping background delivery");
        }
    }

    /// Delivers `update` to every live subscriber of its poll. Returns how
    /// many callbacks ran; zero when the snapshot was already delivered.
    ///
    /// Callbacks run with no lock held, so a callback may unsubscribe itself
    /// or others. Each subscriber's flag is read just before its callback
    /// runs: an `unsubscribe` that returns before that read stops the call,
    /// while a call already past the read on another thread completes.
    pub fn publish(&self, update: &PollUpdate) -> usize {
        let targets: Vec<(Arc<AtomicBool>, Callback)> = {
            let mut state = self.lock();
            let Some(list) = state.subscribers.get(&update.poll_id) else {
                return 0;
            };
            let targets: Vec<_> = list
                .iter()
                .map(|s| (Arc::clone(&s.active), Arc::clone(&s.callback)))
                .collect();

            if state.last_delivered.get(&update.poll_id) == Some(&update.snapshot) {
                debug!(
                    "Skipping {:?} update for poll '{}': unchanged",
                    update.source, update.poll_id
                );
                return 0;
            }
            state
                .last_delivered
                .insert(update.poll_id.clone(), update.snapshot.clone());
            targets
        };

        let mut delivered = 0;
        for (active, callback) in targets {
            if active.load(Ordering::SeqCst) {
                callback(update);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn is_subscribed(&self, poll_id: &str) -> bool {
        self.lock().subscribers.contains_key(poll_id)
    }

    pub fn subscribed_polls(&self) -> Vec<String> {
        self.lock().subscribers.keys().cloned().collect()
    }

    pub fn subscriber_count(&self, poll_id: &str) -> usize {
        self.lock()
            .subscribers
            .get(poll_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn has_workers(&self) -> bool {
        self.lock().workers.is_some()
    }
}

/// Handle returned by `subscribe`. Unsubscribes when dropped.
pub struct Subscription {
    id: Uuid,
    poll_id: String,
    active: Arc<AtomicBool>,
    bus: Weak<ChangeBus>,
}

impl Subscription {
    pub fn poll_id(&self) -> &str {
        &self.poll_id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stops every delivery path for this subscription. Safe to call again,
    /// including from inside the subscription's own callback. No delivery
    /// starts after this returns; one already running on another thread
    /// may still finish.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.poll_id, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{seed, UpdateSource};
    use std::sync::atomic::AtomicUsize;

    fn update(poll_id: &str, snapshot: PollSnapshot) -> PollUpdate {
        PollUpdate {
            poll_id: poll_id.to_string(),
            snapshot,
            source: UpdateSource::Local,
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<PollUpdate>>>, Callback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: Callback = Arc::new(move |u: &PollUpdate| sink.lock().unwrap().push(u.clone()));
        (seen, callback)
    }

    fn no_workers() -> Workers {
        Workers::new(Vec::new())
    }

    #[test]
    fn identical_snapshots_are_delivered_once() {
        let bus = Arc::new(ChangeBus::new());
        let (seen, callback) = recorder();
        let _sub = bus.add("frontend", callback, no_workers);

        let seed = seed::seed_snapshot("frontend");
        assert_eq!(bus.publish(&update("frontend", seed.clone())), 1);
        assert_eq!(bus.publish(&update("frontend", seed.clone())), 0);

        let mut next = seed;
        next.increment("react");
        assert_eq!(bus.publish(&update("frontend", next)), 1);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn updates_only_reach_their_poll() {
        let bus = Arc::new(ChangeBus::new());
        let (seen, callback) = recorder();
        let _sub = bus.add("backend", callback, no_workers);

        assert_eq!(bus.publish(&update("frontend", seed::seed_snapshot("frontend"))), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = Arc::new(ChangeBus::new());
        let (seen, callback) = recorder();
        let sub = bus.add("frontend", callback, no_workers);
        let (other_seen, other) = recorder();
        let _other = bus.add("frontend", other, no_workers);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(bus.subscriber_count("frontend"), 1);

        bus.publish(&update("frontend", seed::seed_snapshot("frontend")));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(other_seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn a_callback_can_unsubscribe_itself() {
        let bus = Arc::new(ChangeBus::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let callback: Callback = {
            let slot = Arc::clone(&slot);
            let calls = Arc::clone(&calls);
            Arc::new(move |_: &PollUpdate| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            })
        };
        *slot.lock().unwrap() = Some(bus.add("frontend", callback, no_workers));

        let mut snapshot = seed::seed_snapshot("frontend");
        assert_eq!(bus.publish(&update("frontend", snapshot.clone())), 1);
        snapshot.increment("vue");
        assert_eq!(bus.publish(&update("frontend", snapshot)), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!bus.is_subscribed("frontend"));
    }

    #[test]
    fn workers_start_once_and_stop_with_last_subscription() {
        let bus = Arc::new(ChangeBus::new());
        let mut starts = 0;

        let first = bus.add("frontend", Arc::new(|_: &PollUpdate| {}), || {
            starts += 1;
            no_workers()
        });
        let second = bus.add("backend", Arc::new(|_: &PollUpdate| {}), || {
            starts += 1;
            no_workers()
        });
        assert_eq!(starts, 1);
        assert!(bus.has_workers());

        drop(first);
        assert!(bus.has_workers());
        assert!(!bus.is_subscribed("frontend"));

        second.unsubscribe();
        assert!(!bus.has_workers());
        assert!(bus.subscribed_polls().is_empty());
    }
}
