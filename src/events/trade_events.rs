//! Normalized records consumed by the watcher and the command surface.
//!
//! Raw upstream JSON and raw Telegram updates are converted into these
//! types at the connector boundary. Nothing downstream touches raw payloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One disclosed transaction from the upstream feed.
///
/// The four rendered fields are required; anything else the source sends is
/// kept in `extra` so that equality and the persisted marker cover the whole
/// record, not just the displayed part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    #[serde(rename = "TransactionDate")]
    pub transaction_date: String,
    #[serde(rename = "Company")]
    pub entity_name: String,
    #[serde(rename = "ValueRange")]
    pub value_range: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TradeEvent {
    /// Builds an event with only the rendered fields set.
    pub fn new(
        transaction_date: impl Into<String>,
        entity_name: impl Into<String>,
        value_range: impl Into<String>,
        transaction_type: impl Into<String>,
    ) -> Self {
        Self {
            transaction_date: transaction_date.into(),
            entity_name: entity_name.into(),
            value_range: value_range.into(),
            transaction_type: transaction_type.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.transaction_date, self.transaction_type, self.entity_name, self.value_range
        )
    }
}

/// Opaque messaging-transport address (a Telegram chat ID here).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for RecipientId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commands understood by the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start` - subscribe the sender.
    Start,
    /// `/stop` - unsubscribe the sender.
    Stop,
}

impl BotCommand {
    /// Parses message text into a command.
    ///
    /// Accepts `/start` and trailing arguments. The addressed form
    /// `/start@SomeBot` is accepted only when `SomeBot` is `bot_username`
    /// (case-insensitive); commands addressed to any other bot, or to any
    /// bot while our own username is unknown, yield `None`.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;

        let name = match name.split_once('@') {
            Some((name, target)) => {
                let ours = bot_username.map(|u| u.trim_start_matches('@'))?;
                if !target.eq_ignore_ascii_case(ours) {
                    return None;
                }
                name
            }
            None => name,
        };

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(BotCommand::Start),
            "stop" => Some(BotCommand::Stop),
            _ => None,
        }
    }
}

/// An inbound command together with the recipient that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub recipient: RecipientId,
    pub command: BotCommand,
}
