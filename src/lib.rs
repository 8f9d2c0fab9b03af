//! Trade Alert Bot
//!
//! Polls a stock-trade disclosure feed and pushes each newly disclosed trade
//! to every Telegram chat that has subscribed with `/start`.
//!
//! # Architecture
//!
//! - **Durable**: the last-seen trade and the subscriber set live on disk, so
//!   restarts neither re-alert nor forget subscribers
//! - **Normalized**: raw feed JSON and raw chat updates become typed events at
//!   the connector boundary
//! - **Isolated delivery**: one recipient's failure never aborts a fan-out
//! - **Two activities**: the periodic watcher and the command handler run
//!   concurrently and share only the subscriber registry
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use trade_alert_bot::connectors::{BotCredentials, FeedClient, TelegramClient};
//! use trade_alert_bot::notify::{Notifier, DEFAULT_TITLE};
//! use trade_alert_bot::store::{JsonFileStore, SubscriberRegistry};
//! use trade_alert_bot::watchers::TradeWatcher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let feed = Arc::new(FeedClient::new()?);
//!     let telegram = Arc::new(TelegramClient::new(BotCredentials::new("token".into(), None))?);
//!     let store = Arc::new(JsonFileStore::new("."));
//!     let registry = Arc::new(SubscriberRegistry::new(store.clone()));
//!     let notifier = Notifier::new(telegram, DEFAULT_TITLE.into(), "https://example.com".into());
//!
//!     let mut watcher = TradeWatcher::new(feed, store, registry, notifier);
//!     watcher.run_cycle().await;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod connectors;
pub mod events;
pub mod notify;
pub mod store;
pub mod utils;
pub mod watchers;

// Re-export commonly used types
pub use commands::CommandHandler;
pub use config::AppConfig;
pub use events::{BotCommand, CommandRequest, RecipientId, TradeEvent};
pub use store::{JsonFileStore, SubscriberRegistry};
pub use watchers::{TradeWatcher, WatcherConfig};
