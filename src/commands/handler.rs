//! Maps `/start` and `/stop` to registry operations and replies.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::connectors::MessageTransport;
use crate::events::{BotCommand, CommandRequest, RecipientId};
use crate::store::{SubscribeOutcome, SubscriberRegistry, UnsubscribeOutcome};

pub const SUBSCRIBED_REPLY: &str =
    "✅ Subscribed! You'll get an alert whenever a new trade is disclosed. Send /stop to unsubscribe.";
pub const ALREADY_SUBSCRIBED_REPLY: &str = "ℹ️ You're already subscribed.";
pub const UNSUBSCRIBED_REPLY: &str = "👋 Unsubscribed. Send /start to subscribe again.";
pub const NOT_SUBSCRIBED_REPLY: &str = "ℹ️ You're not subscribed.";
pub const FAILURE_REPLY: &str = "⚠️ Sorry, something went wrong saving your subscription. Please try again.";

/// Command surface: registry mutations plus acknowledgments.
pub struct CommandHandler {
    registry: Arc<SubscriberRegistry>,
    transport: Arc<dyn MessageTransport>,
}

impl CommandHandler {
    pub fn new(registry: Arc<SubscriberRegistry>, transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Applies `command` for `recipient` and returns the acknowledgment text.
    ///
    /// A persistence failure yields [`FAILURE_REPLY`], never a success text.
    pub async fn execute(&self, command: BotCommand, recipient: &RecipientId) -> &'static str {
        match command {
            BotCommand::Start => match self.registry.add(recipient).await {
                Ok(SubscribeOutcome::Subscribed) => SUBSCRIBED_REPLY,
                Ok(SubscribeOutcome::AlreadySubscribed) => ALREADY_SUBSCRIBED_REPLY,
                Err(e) => {
                    error!("[commands] Failed to subscribe {}: {}", recipient, e);
                    FAILURE_REPLY
                }
            },
            BotCommand::Stop => match self.registry.remove(recipient).await {
                Ok(UnsubscribeOutcome::Unsubscribed) => UNSUBSCRIBED_REPLY,
                Ok(UnsubscribeOutcome::NotSubscribed) => NOT_SUBSCRIBED_REPLY,
                Err(e) => {
                    error!("[commands] Failed to unsubscribe {}: {}", recipient, e);
                    FAILURE_REPLY
                }
            },
        }
    }

    /// Executes a request and sends the reply back to its sender.
    pub async fn handle(&self, request: CommandRequest) {
        let reply = self.execute(request.command, &request.recipient).await;

        if let Err(e) = self.transport.send_text(&request.recipient, reply).await {
            warn!("[commands] Failed to reply to {}: {}", request.recipient, e);
        }
    }

    /// Handles requests until shutdown or until the sender side closes.
    pub async fn run(
        self,
        mut requests: mpsc::Receiver<CommandRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("[commands] CommandHandler starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                request = requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
            }
        }

        info!("[commands] CommandHandler stopped");
    }
}
