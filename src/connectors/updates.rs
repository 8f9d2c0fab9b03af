//! Long-polling loop that turns inbound chat messages into command requests.
//!
//! Key behavior:
//! 1. Offsets are acknowledged so each update is handled once
//! 2. Exponential backoff on errors: 1s, 2s, 4s, ... max 60s
//! 3. Non-command messages are dropped here, never forwarded
//! 4. Exits promptly when the shutdown signal flips

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::events::CommandRequest;

use super::telegram::{normalize_update, DeliveryError, TelegramClient, Update};

/// Maximum backoff between failed polls.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Initial backoff after a failed poll.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Anything that can be long-polled for raw updates.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn poll_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, DeliveryError>;
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn poll_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, DeliveryError> {
        self.get_updates(offset).await
    }
}

/// Polls for updates and forwards normalized commands.
pub struct UpdatePoller<S> {
    source: S,
    command_tx: mpsc::Sender<CommandRequest>,
    offset: Option<i64>,
    current_backoff: Duration,
    bot_username: Option<String>,
}

impl<S: UpdateSource> UpdatePoller<S> {
    pub fn new(source: S, command_tx: mpsc::Sender<CommandRequest>) -> Self {
        Self {
            source,
            command_tx,
            offset: None,
            current_backoff: INITIAL_BACKOFF,
            bot_username: None,
        }
    }

    /// Sets the bot's own username so `/cmd@ThisBot` is recognized.
    /// Without it, addressed commands are ignored.
    pub fn with_bot_username(mut self, bot_username: Option<String>) -> Self {
        self.bot_username = bot_username;
        self
    }

    /// Next offset to acknowledge, if any update has been seen.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Runs until shutdown or until the command receiver goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("[updates] UpdatePoller starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.source.poll_updates(self.offset) => result,
            };

            match result {
                Ok(updates) => {
                    self.current_backoff = INITIAL_BACKOFF;
                    if !self.forward(updates).await {
                        warn!("[updates] Command receiver closed, stopping poller");
                        return;
                    }
                }
                Err(e) => {
                    let delay = match e {
                        DeliveryError::RateLimited(secs) => Duration::from_secs(secs),
                        _ => self.current_backoff,
                    };
                    warn!("[updates] Polling failed: {}. Retrying in {:?}", e, delay);

                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    self.current_backoff = std::cmp::min(self.current_backoff * 2, MAX_BACKOFF);
                }
            }
        }

        info!("[updates] UpdatePoller stopped");
    }

    /// Forwards commands from a batch; returns false if the receiver is gone.
    async fn forward(&mut self, updates: Vec<Update>) -> bool {
        for update in updates {
            self.offset = Some(update.update_id + 1);

            match normalize_update(&update, self.bot_username.as_deref()) {
                Some(request) => {
                    debug!(
                        "[updates] {:?} from {}",
                        request.command, request.recipient
                    );
                    if self.command_tx.send(request).await.is_err() {
                        return false;
                    }
                }
                None => debug!("[updates] Ignoring update {}", update.update_id),
            }
        }
        true
    }
}
