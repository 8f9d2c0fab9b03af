//! Message rendering and per-recipient delivery.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connectors::{DeliveryError, MessageTransport};
use crate::events::{RecipientId, TradeEvent};

/// Default alert headline.
pub const DEFAULT_TITLE: &str = "New Pelosi Stock Trade";

/// Outcome of one fan-out round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: Vec<RecipientId>,
    pub failed: Vec<(RecipientId, String)>,
}

impl FanOutReport {
    /// Total recipients attempted.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renders trade alerts and pushes them through a [`MessageTransport`].
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MessageTransport>,
    title: String,
    reference_url: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MessageTransport>, title: String, reference_url: String) -> Self {
        Self {
            transport,
            title,
            reference_url,
        }
    }

    /// Formats the alert text for `event`.
    pub fn render(&self, event: &TradeEvent) -> String {
        format!(
            "🚨 {title} 🚨\n\n\
             📅 Date: {date}\n\
             🏢 Company: {company}\n\
             💰 Amount: {amount}\n\
             📈 Type: {kind}\n\n\
             🔗 More info: {url}",
            title = self.title,
            date = event.transaction_date,
            company = event.entity_name,
            amount = event.value_range,
            kind = event.transaction_type,
            url = self.reference_url,
        )
    }

    /// Sends `text` to one recipient.
    pub async fn deliver(&self, recipient: &RecipientId, text: &str) -> Result<(), DeliveryError> {
        self.transport.send_text(recipient, text).await
    }

    /// Sends `text` to every recipient, one at a time.
    ///
    /// A failed recipient is recorded and skipped; the batch always runs to
    /// the end.
    pub async fn notify_all<'a, I>(&self, recipients: I, text: &str) -> FanOutReport
    where
        I: IntoIterator<Item = &'a RecipientId>,
    {
        let mut report = FanOutReport::default();

        for recipient in recipients {
            match self.deliver(recipient, text).await {
                Ok(()) => {
                    debug!("[notifier] Delivered to {}", recipient);
                    report.delivered.push(recipient.clone());
                }
                Err(e) => {
                    warn!("[notifier] Delivery to {} failed: {}", recipient, e);
                    report.failed.push((recipient.clone(), e.to_string()));
                }
            }
        }

        info!(
            "[notifier] Fan-out complete: {} delivered, {} failed",
            report.delivered.len(),
            report.failed.len()
        );
        report
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("title", &self.title)
            .field("reference_url", &self.reference_url)
            .finish()
    }
}
