//! Connectors for external services.
//!
//! Low-level clients for the disclosure feed and the Telegram Bot API. Data
//! fetched here is raw and is normalized into `events` types before use.

mod auth;
pub mod feed;
pub mod mock;
pub mod telegram;
pub mod updates;

pub use auth::BotCredentials;
pub use feed::{FeedClient, FetchError, TradeFeed};
pub use telegram::{DeliveryError, MessageTransport, TelegramClient};
pub use updates::{UpdatePoller, UpdateSource};
