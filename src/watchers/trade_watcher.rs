//! Periodic watch loop: fetch, decide, notify, persist.
//!
//! Each period runs one cycle:
//! `Idle -> Fetching -> Deciding -> Notifying -> Persisting -> Idle`.
//! Fetch failures skip the cycle and are retried next period, never
//! immediately. Nothing inside a cycle can stop the loop; only the
//! shutdown signal does, and only between cycles.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::connectors::TradeFeed;
use crate::events::TradeEvent;
use crate::notify::{FanOutReport, Notifier};
use crate::store::{StateStore, SubscriberRegistry};

use super::change_detector::is_new;

/// Configuration for the trade watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Time between cycles. The first cycle runs immediately.
    pub poll_interval: Duration,
    /// Consecutive fetch failures before logging at error level.
    pub max_consecutive_failures: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3600),
            max_consecutive_failures: 3,
        }
    }
}

/// Where the watcher is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    Fetching,
    Deciding,
    Notifying,
    Persisting,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Fetch or parse failed; nothing was touched.
    FetchFailed(String),
    /// Feed returned no events.
    Empty,
    /// Newest event matches the marker.
    Unchanged,
    /// New event, but the subscriber set could not be read. Marker untouched
    /// so the event is retried next cycle.
    SubscribersUnavailable(String),
    /// New event handled.
    Notified {
        event: TradeEvent,
        report: FanOutReport,
        marker_saved: bool,
    },
}

/// Watches the feed and alerts subscribers on new trades.
pub struct TradeWatcher {
    config: WatcherConfig,
    feed: Arc<dyn TradeFeed>,
    store: Arc<dyn StateStore>,
    registry: Arc<SubscriberRegistry>,
    notifier: Notifier,
    phase: WatchPhase,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
}

impl TradeWatcher {
    /// Creates a watcher with the default configuration.
    pub fn new(
        feed: Arc<dyn TradeFeed>,
        store: Arc<dyn StateStore>,
        registry: Arc<SubscriberRegistry>,
        notifier: Notifier,
    ) -> Self {
        Self::with_config(WatcherConfig::default(), feed, store, registry, notifier)
    }

    /// Creates a watcher with a custom configuration.
    pub fn with_config(
        config: WatcherConfig,
        feed: Arc<dyn TradeFeed>,
        store: Arc<dyn StateStore>,
        registry: Arc<SubscriberRegistry>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            feed,
            store,
            registry,
            notifier,
            phase: WatchPhase::Idle,
            consecutive_failures: 0,
            last_success: None,
        }
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// When the feed last answered successfully.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Runs cycles every `poll_interval` until `shutdown` becomes true.
    ///
    /// A cycle in progress, including its fan-out, always completes before
    /// the loop checks for shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[watcher] TradeWatcher starting (interval: {:?}, source: {})",
            self.config.poll_interval,
            self.feed.source_url()
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            match self.run_cycle().await {
                CycleOutcome::Notified {
                    event,
                    report,
                    marker_saved,
                } => info!(
                    "[watcher] Cycle done: new trade {} ({} delivered, {} failed, marker saved: {})",
                    event,
                    report.delivered.len(),
                    report.failed.len(),
                    marker_saved
                ),
                outcome => debug!("[watcher] Cycle done: {:?}", outcome),
            }
        }

        info!("[watcher] TradeWatcher stopped");
    }

    /// Runs a single fetch/decide/notify/persist cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.cycle().await;
        self.phase = WatchPhase::Idle;
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        self.phase = WatchPhase::Fetching;
        let events = match self.feed.fetch().await {
            Ok(events) => {
                self.consecutive_failures = 0;
                self.last_success = Some(Utc::now());
                events
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.max_consecutive_failures {
                    let since = self
                        .last_success
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string());
                    error!(
                        "[watcher] Fetch failed {} times in a row (last success: {}): {}",
                        self.consecutive_failures, since, e
                    );
                } else {
                    warn!(
                        "[watcher] Fetch failed (attempt {}): {}. Retrying next period",
                        self.consecutive_failures, e
                    );
                }
                return CycleOutcome::FetchFailed(e.to_string());
            }
        };

        self.phase = WatchPhase::Deciding;
        let Some(candidate) = events.into_iter().next() else {
            debug!("[watcher] Feed returned no trades");
            return CycleOutcome::Empty;
        };

        let last = match self.store.load_marker().await {
            Ok(last) => last,
            Err(e) => {
                // Re-alerting beats silently missing a trade.
                warn!("[watcher] Could not read marker, treating as unseen: {}", e);
                None
            }
        };

        if !is_new(&candidate, last.as_ref()) {
            debug!("[watcher] No new trade (latest: {})", candidate);
            return CycleOutcome::Unchanged;
        }

        info!("[watcher] New trade detected: {}", candidate);

        self.phase = WatchPhase::Notifying;
        let subscribers = match self.registry.list().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!("[watcher] Could not read subscribers, skipping cycle: {}", e);
                return CycleOutcome::SubscribersUnavailable(e.to_string());
            }
        };

        let report = if subscribers.is_empty() {
            info!("[watcher] No subscribers, marking trade as seen without sending");
            FanOutReport::default()
        } else {
            let text = self.notifier.render(&candidate);
            self.notifier.notify_all(&subscribers, &text).await
        };

        self.phase = WatchPhase::Persisting;
        let marker_saved = match self.store.save_marker(&candidate).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "[watcher] Failed to save marker, trade may be re-sent next cycle: {}",
                    e
                );
                false
            }
        };

        CycleOutcome::Notified {
            event: candidate,
            report,
            marker_saved,
        }
    }
}

impl std::fmt::Debug for TradeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeWatcher")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("last_success", &self.last_success)
            .finish()
    }
}
