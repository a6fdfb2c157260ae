use std::sync::Weak;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, MissedTickBehavior};

use crate::models::UpdateSource;
use crate::storage::StorageEvent;
use crate::store::PollStore;

/// Follows the backing store's change signal. Events written by this tab
/// are ignored; the local publish already covered them.
pub async fn follow_change_signal(store: Weak<PollStore>, mut events: broadcast::Receiver<StorageEvent>) {
    debug!("Change-signal listener started");
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                // Polling picks up whatever was dropped here
                warn!("Change-signal listener lagged, {} event(s) missed", missed);
                continue;
            }
            Err(RecvError::Closed) => {
                info!("Backing store change signal closed");
                return;
            }
        };

        let Some(store) = store.upgrade() else {
            return;
        };
        if event.origin == store.tab_id() {
            continue;
        }
        let Some(poll_id) = store.config().poll_id_from_key(&event.key) else {
            continue;
        };
        if !store.bus().is_subscribed(poll_id) {
            continue;
        }

        debug!("Tab {} changed poll '{}' at {}", event.origin, poll_id, event.at.to_rfc3339());
        store.reload(poll_id, UpdateSource::CrossTab).await;
    }
}

/// Re-reads every subscribed poll on a fixed period and notifies when the
/// durable value no longer matches memory.
pub async fn poll_for_changes(store: Weak<PollStore>, period: Duration) {
    debug!("Polling fallback started, every {:?}", period);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(store) = store.upgrade() else {
            return;
        };
        for poll_id in store.bus().subscribed_polls() {
            store.reload(&poll_id, UpdateSource::Polling).await;
        }
    }
}
