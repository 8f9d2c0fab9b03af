//! Durable state and the subscriber registry built on it.
//!
//! The registry only talks to the [`StateStore`] trait, so the JSON-file
//! backend can be swapped for another key-value store without touching it.

mod registry;
mod state_store;

pub use registry::{SubscribeOutcome, SubscriberRegistry, UnsubscribeOutcome};
pub use state_store::{
    JsonFileStore, MemoryStore, StateStore, StoreError, MARKER_FILE, SUBSCRIBERS_FILE,
};
