//! Feed watching.
//!
//! The change detector is a pure function; the trade watcher drives it on
//! a timer and owns all side effects of a cycle.

mod change_detector;
mod trade_watcher;

pub use change_detector::is_new;
pub use trade_watcher::{CycleOutcome, TradeWatcher, WatchPhase, WatcherConfig};
