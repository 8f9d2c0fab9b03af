//! REST client for the upstream trade-disclosure feed.
//!
//! One GET per call, no internal retry. Retry policy belongs to the watcher,
//! which simply tries again next period.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::events::TradeEvent;

/// Default disclosure source.
pub const DEFAULT_FEED_URL: &str =
    "https://www.quiverquant.com/congresstrading/politician/Nancy%20Pelosi-P000197";

/// Browser-like identity; the source blocks default client user agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Feed returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Rate limited, retry after: {0}s")]
    RateLimited(u64),

    #[error("Failed to parse feed: {0}")]
    ParseError(String),
}

/// Source of candidate trade events, newest first.
#[async_trait]
pub trait TradeFeed: Send + Sync {
    /// Fetches the current list exactly as the source orders it.
    async fn fetch(&self) -> Result<Vec<TradeEvent>, FetchError>;

    /// Human-readable location of the feed, used as the reference link.
    fn source_url(&self) -> &str;
}

/// HTTP implementation of [`TradeFeed`].
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    url: String,
    user_agent: String,
}

impl FeedClient {
    /// Creates a feed client for the default source.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_url(DEFAULT_FEED_URL.to_string(), DEFAULT_USER_AGENT.to_string())
    }

    /// Creates a feed client for a custom URL and user agent.
    pub fn with_url(url: String, user_agent: String) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            url,
            user_agent,
        })
    }
}

#[async_trait]
impl TradeFeed for FeedClient {
    async fn fetch(&self) -> Result<Vec<TradeEvent>, FetchError> {
        debug!("[feed] Fetching {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            warn!("[feed] Rate limited. Retry after {}s", retry_after);
            return Err(FetchError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        parse_feed_response(status, &body)
    }

    fn source_url(&self) -> &str {
        &self.url
    }
}

/// Classifies a feed response into events or a [`FetchError`].
///
/// Any non-success status is a failure carrying the code. The body must be a
/// JSON array and its newest (first) entry must be a well-formed event; older
/// entries that fail to parse are dropped.
pub fn parse_feed_response(
    status: StatusCode,
    body: &str,
) -> Result<Vec<TradeEvent>, FetchError> {
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        });
    }

    let entries: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;

    let mut entries = entries.into_iter();
    let Some(newest) = entries.next() else {
        return Ok(Vec::new());
    };

    let newest: TradeEvent = serde_json::from_value(newest)
        .map_err(|e| FetchError::ParseError(format!("newest entry: {}", e)))?;

    let mut events = vec![newest];
    for (index, entry) in entries.enumerate() {
        match serde_json::from_value(entry) {
            Ok(event) => events.push(event),
            Err(e) => debug!("[feed] Skipping malformed entry {}: {}", index + 1, e),
        }
    }

    Ok(events)
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("url", &self.url)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
