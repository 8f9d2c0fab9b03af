//! Subscriber registry: add/remove/list over the persisted subscriber set.
//!
//! Mutations run load-modify-persist under one async mutex, so two racing
//! `/start` or `/stop` commands cannot lose each other's update. `list()`
//! does not take that mutex; a snapshot may miss a concurrent mutation.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::events::RecipientId;

use super::state_store::{StateStore, StoreError};

/// Result of [`SubscriberRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
}

/// Result of [`SubscriberRegistry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Unsubscribed,
    NotSubscribed,
}

/// Durable subscriber set shared by the watcher and the command surface.
pub struct SubscriberRegistry {
    store: Arc<dyn StateStore>,
    write_lock: Mutex<()>,
}

impl SubscriberRegistry {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Subscribes `id`. Returns once the change is on disk.
    pub async fn add(&self, id: &RecipientId) -> Result<SubscribeOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut subscribers = self.store.load_subscribers().await?;
        if !subscribers.insert(id.clone()) {
            debug!("[registry] {} already subscribed", id);
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        self.store.save_subscribers(&subscribers).await?;
        info!("[registry] Subscribed {} ({} total)", id, subscribers.len());
        Ok(SubscribeOutcome::Subscribed)
    }

    /// Unsubscribes `id`. Returns once the change is on disk.
    pub async fn remove(&self, id: &RecipientId) -> Result<UnsubscribeOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut subscribers = self.store.load_subscribers().await?;
        if !subscribers.remove(id) {
            debug!("[registry] {} was not subscribed", id);
            return Ok(UnsubscribeOutcome::NotSubscribed);
        }

        self.store.save_subscribers(&subscribers).await?;
        info!("[registry] Unsubscribed {} ({} remaining)", id, subscribers.len());
        Ok(UnsubscribeOutcome::Unsubscribed)
    }

    /// Current subscribers.
    pub async fn list(&self) -> Result<BTreeSet<RecipientId>, StoreError> {
        self.store.load_subscribers().await
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileStore, MemoryStore};

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let registry = SubscriberRegistry::new(Arc::new(MemoryStore::new()));
        let x = RecipientId::new("x");

        assert_eq!(registry.add(&x).await.unwrap(), SubscribeOutcome::Subscribed);
        assert_eq!(registry.add(&x).await.unwrap(), SubscribeOutcome::AlreadySubscribed);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = SubscriberRegistry::new(Arc::new(MemoryStore::new()));
        let x = RecipientId::new("x");
        registry.add(&x).await.unwrap();

        assert_eq!(registry.remove(&x).await.unwrap(), UnsubscribeOutcome::Unsubscribed);
        assert_eq!(registry.remove(&x).await.unwrap(), UnsubscribeOutcome::NotSubscribed);
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changes_are_durable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SubscriberRegistry::new(Arc::new(JsonFileStore::new(dir.path())));
        registry.add(&RecipientId::new("a")).await.unwrap();
        registry.add(&RecipientId::new("b")).await.unwrap();
        registry.remove(&RecipientId::new("a")).await.unwrap();

        let reopened = SubscriberRegistry::new(Arc::new(JsonFileStore::new(dir.path())));
        let ids: Vec<RecipientId> = reopened.list().await.unwrap().into_iter().collect();
        assert_eq!(ids, vec![RecipientId::new("b")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(SubscriberRegistry::new(Arc::new(JsonFileStore::new(dir.path()))));

        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.add(&RecipientId::new(format!("user-{i}"))).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), SubscribeOutcome::Subscribed);
        }

        assert_eq!(registry.list().await.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            SubscriberRegistry::new(Arc::new(JsonFileStore::new(dir.path().join("gone"))));

        let err = registry.add(&RecipientId::new("x")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
