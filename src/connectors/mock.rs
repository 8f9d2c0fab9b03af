//! In-process stand-ins for the feed and the messaging transport.
//!
//! Used by unit tests and the integration tests under `tests/`.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::events::{RecipientId, TradeEvent};

use super::feed::{FetchError, TradeFeed};
use super::telegram::{DeliveryError, MessageTransport};

/// Canned feed response.
#[derive(Debug, Clone)]
pub enum MockFeedResponse {
    Events(Vec<TradeEvent>),
    Status(u16),
    Malformed,
}

/// Mock feed that replays the configured response on every fetch.
pub struct MockFeed {
    response: Mutex<MockFeedResponse>,
    fetches: Mutex<usize>,
}

impl MockFeed {
    pub fn with_events(events: Vec<TradeEvent>) -> Self {
        Self {
            response: Mutex::new(MockFeedResponse::Events(events)),
            fetches: Mutex::new(0),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            response: Mutex::new(MockFeedResponse::Status(status)),
            fetches: Mutex::new(0),
        }
    }

    /// Replaces the response returned by subsequent fetches.
    pub fn set_response(&self, response: MockFeedResponse) {
        *self.response.lock().unwrap() = response;
    }

    /// Number of fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl TradeFeed for MockFeed {
    async fn fetch(&self) -> Result<Vec<TradeEvent>, FetchError> {
        *self.fetches.lock().unwrap() += 1;

        match self.response.lock().unwrap().clone() {
            MockFeedResponse::Events(events) => Ok(events),
            MockFeedResponse::Status(status) => Err(FetchError::Status {
                status,
                message: String::new(),
            }),
            MockFeedResponse::Malformed => {
                Err(FetchError::ParseError("missing field `Company`".to_string()))
            }
        }
    }

    fn source_url(&self) -> &str {
        "https://feed.test/trades"
    }
}

/// Mock transport recording every delivery.
pub struct MockTransport {
    sent: Mutex<Vec<(RecipientId, String)>>,
    failing: Mutex<HashSet<RecipientId>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Makes every delivery to `recipient` fail.
    pub fn fail_for(&self, recipient: RecipientId) {
        self.failing.lock().unwrap().insert(recipient);
    }

    /// Successful deliveries, in order.
    pub fn sent(&self) -> Vec<(RecipientId, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Successful deliveries to one recipient.
    pub fn sent_to(&self, recipient: &RecipientId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn send_text(&self, recipient: &RecipientId, text: &str) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(recipient) {
            return Err(DeliveryError::ApiError {
                status: 403,
                message: "Forbidden: bot was blocked by the user".to_string(),
            });
        }

        self.sent
            .lock()
            .unwrap()
            .push((recipient.clone(), text.to_string()));
        Ok(())
    }
}
