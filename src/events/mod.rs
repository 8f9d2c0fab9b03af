//! Event types for the trade alert bot.
//!
//! All external data (feed records, inbound chat messages) is converted
//! into these normalized types BEFORE the watcher or command surface sees it.

mod trade_events;

pub use trade_events::{BotCommand, CommandRequest, RecipientId, TradeEvent};
