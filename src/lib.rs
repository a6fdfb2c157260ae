//! Live poll tallies shared between independent tabs.
//!
//! Each tab builds one [`PollStore`] over a shared [`BackingStore`], reads
//! and mutates poll snapshots through it, and subscribes to changes made by
//! itself or by any other tab on the same store.

pub mod codec;
pub mod commands;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod session;
pub mod storage;
pub mod store;
pub mod tasks;
pub mod voting;

pub use config::Config;
pub use models::{PollOption, PollSnapshot, PollUpdate, UpdateSource};
pub use storage::{BackingStore, InMemoryBackingStore, TabId};
pub use store::{PollStore, PollStoreError, Subscription};
