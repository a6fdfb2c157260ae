pub mod seed;

use serde::{Deserialize, Serialize};

/// One selectable choice in a poll. Only `votes` ever changes after seeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub title: String,
    pub description: String,
    pub votes: u64,
    pub color: String,
}

/// The full state of one poll's options at a point in time, in seed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub options: Vec<PollOption>,
}

impl PollSnapshot {
    pub fn new(options: Vec<PollOption>) -> Self {
        Self { options }
    }

    /// Sum of all option tallies. Always recomputed, never stored.
    /// Saturates at `u64::MAX`.
    pub fn total_votes(&self) -> u64 {
        self.options
            .iter()
            .fold(0u64, |total, option| total.saturating_add(option.votes))
    }

    /// Exact sum of all option tallies, `None` if it does not fit in a `u64`.
    pub fn checked_total(&self) -> Option<u64> {
        self.options
            .iter()
            .try_fold(0u64, |total, option| total.checked_add(option.votes))
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn option(&self, option_id: &str) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    // Returns false when no option matches or the total is already at
    // `u64::MAX`; the snapshot is left untouched.
    pub(crate) fn increment(&mut self, option_id: &str) -> bool {
        if self.checked_total().is_none_or(|total| total == u64::MAX) {
            return false;
        }
        match self.options.iter_mut().find(|option| option.id == option_id) {
            Some(option) => {
                option.votes += 1;
                true
            }
            None => false,
        }
    }

    /// Same options, same order, every tally at zero.
    pub fn zeroed(&self) -> Self {
        let options = self
            .options
            .iter()
            .map(|option| PollOption {
                votes: 0,
                ..option.clone()
            })
            .collect();
        Self { options }
    }
}

/// A catalogue entry: display metadata plus the seed options of a poll.
#[derive(Debug, Clone)]
pub struct PollDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub seed: PollSnapshot,
}

/// Which delivery path produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateSource {
    /// A mutation made by this tab.
    Local,
    /// The backing store's change signal, fired by another tab's write.
    CrossTab,
    /// The periodic re-read found the durable value had moved.
    Polling,
}

/// Payload handed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollUpdate {
    pub poll_id: String,
    pub snapshot: PollSnapshot,
    pub source: UpdateSource,
}
