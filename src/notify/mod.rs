//! Alert rendering and subscriber fan-out.

mod notifier;

pub use notifier::{FanOutReport, Notifier, DEFAULT_TITLE};
