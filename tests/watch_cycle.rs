//! End-to-end cycles against on-disk state with mocked feed and transport.

use std::sync::Arc;

use trade_alert_bot::commands::{CommandHandler, SUBSCRIBED_REPLY};
use trade_alert_bot::connectors::mock::{MockFeed, MockFeedResponse, MockTransport};
use trade_alert_bot::connectors::TradeFeed;
use trade_alert_bot::notify::{Notifier, DEFAULT_TITLE};
use trade_alert_bot::store::{JsonFileStore, StateStore, SubscriberRegistry};
use trade_alert_bot::watchers::{CycleOutcome, TradeWatcher};
use trade_alert_bot::{BotCommand, RecipientId, TradeEvent};

struct Bot {
    feed: Arc<MockFeed>,
    store: Arc<JsonFileStore>,
    registry: Arc<SubscriberRegistry>,
    transport: Arc<MockTransport>,
    watcher: TradeWatcher,
}

/// Builds a fresh process over `dir`, as a restart would.
fn start(dir: &std::path::Path, feed: Arc<MockFeed>, transport: Arc<MockTransport>) -> Bot {
    let store = Arc::new(JsonFileStore::new(dir));
    let registry = Arc::new(SubscriberRegistry::new(store.clone()));
    let notifier = Notifier::new(
        transport.clone(),
        DEFAULT_TITLE.to_string(),
        feed.source_url().to_string(),
    );
    let watcher = TradeWatcher::new(feed.clone(), store.clone(), registry.clone(), notifier);

    Bot {
        feed,
        store,
        registry,
        transport,
        watcher,
    }
}

fn acme() -> TradeEvent {
    TradeEvent::new("2024-01-01", "Acme", "$1K-$15K", "Purchase")
}

#[tokio::test]
async fn test_new_trade_reaches_every_subscriber_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut bot = start(
        dir.path(),
        Arc::new(MockFeed::with_events(vec![acme()])),
        Arc::new(MockTransport::new()),
    );
    let a = RecipientId::new("A");
    let b = RecipientId::new("B");
    bot.registry.add(&a).await.unwrap();
    bot.registry.add(&b).await.unwrap();

    match bot.watcher.run_cycle().await {
        CycleOutcome::Notified { report, marker_saved, .. } => {
            assert_eq!(report.delivered.len(), 2);
            assert!(report.failed.is_empty());
            assert!(marker_saved);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    for recipient in [&a, &b] {
        let texts = bot.transport.sent_to(recipient);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Acme"));
        assert!(texts[0].contains("Purchase"));
    }
    assert_eq!(bot.store.load_marker().await.unwrap(), Some(acme()));

    assert_eq!(bot.watcher.run_cycle().await, CycleOutcome::Unchanged);
    assert_eq!(bot.transport.sent().len(), 2);
}

#[tokio::test]
async fn test_restart_does_not_realert() {
    let dir = tempfile::tempdir().unwrap();
    let feed = Arc::new(MockFeed::with_events(vec![acme()]));

    let mut first = start(dir.path(), feed.clone(), Arc::new(MockTransport::new()));
    first.registry.add(&RecipientId::new("A")).await.unwrap();
    first.watcher.run_cycle().await;
    assert_eq!(first.transport.sent().len(), 1);
    drop(first);

    let mut second = start(dir.path(), feed, Arc::new(MockTransport::new()));
    assert_eq!(second.watcher.run_cycle().await, CycleOutcome::Unchanged);
    assert!(second.transport.sent().is_empty());
    assert_eq!(second.registry.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_leaves_state_files_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut bot = start(
        dir.path(),
        Arc::new(MockFeed::with_events(vec![acme()])),
        Arc::new(MockTransport::new()),
    );
    bot.registry.add(&RecipientId::new("A")).await.unwrap();
    bot.watcher.run_cycle().await;

    let marker_before = std::fs::read(bot.store.marker_path()).unwrap();
    let subscribers_before = std::fs::read(bot.store.subscribers_path()).unwrap();

    bot.feed.set_response(MockFeedResponse::Status(500));
    assert!(matches!(bot.watcher.run_cycle().await, CycleOutcome::FetchFailed(_)));

    bot.feed.set_response(MockFeedResponse::Malformed);
    assert!(matches!(bot.watcher.run_cycle().await, CycleOutcome::FetchFailed(_)));

    assert_eq!(std::fs::read(bot.store.marker_path()).unwrap(), marker_before);
    assert_eq!(std::fs::read(bot.store.subscribers_path()).unwrap(), subscribers_before);
    assert_eq!(bot.feed.fetch_count(), 3);
}

#[tokio::test]
async fn test_blocked_recipient_does_not_stop_fan_out_or_marker() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new());
    transport.fail_for(RecipientId::new("2"));
    let mut bot = start(
        dir.path(),
        Arc::new(MockFeed::with_events(vec![acme()])),
        transport,
    );
    for id in ["1", "2", "3"] {
        bot.registry.add(&RecipientId::new(id)).await.unwrap();
    }

    match bot.watcher.run_cycle().await {
        CycleOutcome::Notified { report, marker_saved, .. } => {
            assert_eq!(report.delivered.len(), 2);
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.failed[0].0, RecipientId::new("2"));
            assert!(marker_saved);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(bot.store.load_marker().await.unwrap(), Some(acme()));
}

#[tokio::test]
async fn test_subscriber_added_by_command_gets_next_trade() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new());
    let mut bot = start(
        dir.path(),
        Arc::new(MockFeed::with_events(vec![acme()])),
        transport.clone(),
    );
    let handler = CommandHandler::new(bot.registry.clone(), transport.clone());
    let me = RecipientId::new("99");

    // Nobody subscribed yet: marker advances silently.
    bot.watcher.run_cycle().await;

    assert_eq!(handler.execute(BotCommand::Start, &me).await, SUBSCRIBED_REPLY);
    assert_eq!(bot.watcher.run_cycle().await, CycleOutcome::Unchanged);

    let sale = TradeEvent::new("2024-03-01", "Initech", "$15K-$50K", "Sale");
    bot.feed.set_response(MockFeedResponse::Events(vec![sale]));
    bot.watcher.run_cycle().await;

    let texts = transport.sent_to(&me);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Initech"));
}

#[tokio::test]
async fn test_corrupt_marker_is_treated_as_unseen_and_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let mut bot = start(
        dir.path(),
        Arc::new(MockFeed::with_events(vec![acme()])),
        Arc::new(MockTransport::new()),
    );
    bot.registry.add(&RecipientId::new("A")).await.unwrap();
    std::fs::write(bot.store.marker_path(), b"{\"Company\": ").unwrap();
    assert!(bot.store.load_marker().await.is_err());

    match bot.watcher.run_cycle().await {
        CycleOutcome::Notified { report, marker_saved, .. } => {
            assert_eq!(report.delivered, vec![RecipientId::new("A")]);
            assert!(marker_saved);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(bot.store.load_marker().await.unwrap(), Some(acme()));
    assert_eq!(bot.watcher.run_cycle().await, CycleOutcome::Unchanged);
    assert_eq!(bot.transport.sent().len(), 1);
}
