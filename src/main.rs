//! Trade Alert Bot - Main Entry Point
//!
//! Spawns three independent tasks:
//! - the trade watcher (periodic fetch/notify)
//! - the update poller (inbound Telegram messages)
//! - the command handler (`/start`, `/stop`)
//!
//! Ctrl-C flips a shared shutdown signal; each task exits at its next
//! suspension point.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use trade_alert_bot::commands::CommandHandler;
use trade_alert_bot::config::AppConfig;
use trade_alert_bot::connectors::{FeedClient, TelegramClient, UpdatePoller};
use trade_alert_bot::notify::Notifier;
use trade_alert_bot::store::{JsonFileStore, SubscribeOutcome, SubscriberRegistry};
use trade_alert_bot::utils::init_telemetry;
use trade_alert_bot::watchers::{TradeWatcher, WatcherConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file found or error loading it: {}", e);
    }

    let config = AppConfig::from_env()?;
    init_telemetry(config.log_format);

    info!("Trade Alert Bot starting");
    info!("Feed: {}", config.feed_url);
    info!("State directory: {}", config.state_dir.display());
    info!("Poll interval: {:?}", config.poll_interval);

    tokio::fs::create_dir_all(&config.state_dir).await?;

    let feed = Arc::new(FeedClient::with_url(
        config.feed_url.clone(),
        config.user_agent.clone(),
    )?);
    let telegram = Arc::new(TelegramClient::with_api_url(
        config.credentials.clone(),
        config.telegram_api_url.clone(),
    )?);
    let store = Arc::new(JsonFileStore::new(&config.state_dir));
    let registry = Arc::new(SubscriberRegistry::new(store.clone()));

    // Single-recipient deployments: make sure the fixed chat is subscribed.
    if let Some(chat_id) = &config.credentials.chat_id {
        match registry.add(chat_id).await {
            Ok(SubscribeOutcome::Subscribed) => info!("Subscribed fixed recipient {}", chat_id),
            Ok(SubscribeOutcome::AlreadySubscribed) => {}
            Err(e) => warn!("Could not subscribe fixed recipient {}: {}", chat_id, e),
        }
    }

    let notifier = Notifier::new(
        telegram.clone(),
        config.alert_title.clone(),
        config.feed_url.clone(),
    );
    let watcher = TradeWatcher::with_config(
        WatcherConfig {
            poll_interval: config.poll_interval,
            ..WatcherConfig::default()
        },
        feed,
        store,
        registry.clone(),
        notifier,
    );

    let (command_tx, command_rx) = mpsc::channel(100);
    let bot_username = match telegram.get_me().await {
        Ok(me) => me.username,
        Err(e) => {
            warn!("Could not look up bot username, addressed commands will be ignored: {}", e);
            None
        }
    };
    let poller = UpdatePoller::new((*telegram).clone(), command_tx).with_bot_username(bot_username);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = vec![
        ("watcher", tokio::spawn(watcher.run(shutdown_rx.clone()))),
        ("updates", tokio::spawn(poller.run(shutdown_rx.clone()))),
        (
            "commands",
            tokio::spawn(
                CommandHandler::new(registry, telegram).run(command_rx, shutdown_rx),
            ),
        ),
    ];

    info!("All tasks started. Press Ctrl+C to stop.");

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for Ctrl+C, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    for (name, handle) in handles {
        if let Err(e) = handle.await {
            if e.is_cancelled() {
                info!("[{}] Task was cancelled", name);
            } else {
                error!("[{}] Task panicked: {:?}", name, e);
            }
        }
    }

    info!("All tasks stopped. Shutting down.");
    Ok(())
}
