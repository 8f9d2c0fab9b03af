//! Process configuration loaded from the environment.
//!
//! `dotenvy` is applied by the binary before this runs, so a `.env` file
//! works the same as real environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::connectors::{feed, telegram, BotCredentials};
use crate::events::RecipientId;
use crate::notify::DEFAULT_TITLE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: BotCredentials,
    pub feed_url: String,
    pub user_agent: String,
    pub poll_interval: Duration,
    pub state_dir: PathBuf,
    pub telegram_api_url: String,
    pub alert_title: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token =
            get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let chat_id = get("CHAT_ID").map(RecipientId::new);

        let poll_interval = match get("POLL_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|e| ConfigError::Invalid {
                    name: "POLL_INTERVAL_SECS",
                    reason: format!("{raw:?}: {e}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        name: "POLL_INTERVAL_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(3600),
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    reason: format!("expected \"compact\" or \"json\", got {other:?}"),
                })
            }
        };

        Ok(Self {
            credentials: BotCredentials::new(bot_token, chat_id),
            feed_url: get("FEED_URL").unwrap_or_else(|| feed::DEFAULT_FEED_URL.to_string()),
            user_agent: get("FEED_USER_AGENT")
                .unwrap_or_else(|| feed::DEFAULT_USER_AGENT.to_string()),
            poll_interval,
            state_dir: get("STATE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| telegram::DEFAULT_API_URL.to_string()),
            alert_title: get("ALERT_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            log_format,
        })
    }
}
