//! Register and unregister subscriber blocks per event category.
//!
//! The backing store only offers get/set, so each mutation is a
//! read-modify-write. Mutations of the same category are serialised through
//! a per-category async mutex; this closes the lost-update window for writers
//! inside one process. Writers in other processes sharing the same store are
//! not covered.

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::EventCategory;
use crate::error::Result;
use crate::store::SubscriptionStore;
use crate::types::SubscriberRecord;

pub struct SubscriptionRegistry {
    store: SubscriptionStore,
    locks: [Mutex<()>; EventCategory::COUNT],
}

impl SubscriptionRegistry {
    pub fn new(store: SubscriptionStore) -> Self {
        Self {
            store,
            locks: std::array::from_fn(|_| Mutex::new(())),
        }
    }

    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    /// Add `subscriber_id` to the category's list. Returns `false` when it was
    /// already registered, in which case nothing is written.
    pub async fn register(
        &self,
        category: EventCategory,
        subscriber_id: &str,
        workspace_id: Option<&str>,
    ) -> Result<bool> {
        let _guard = self.locks[category.index()].lock().await;

        let mut list = self.store.get(category).await?.unwrap_or_default();
        if list.iter().any(|r| r.subscriber_id == subscriber_id) {
            debug!(%category, subscriber_id, "already registered");
            return Ok(false);
        }

        list.push(SubscriberRecord::new(subscriber_id, workspace_id));
        self.store.set(category, &list).await?;
        info!(%category, subscriber_id, workspace_id, "registered subscriber");
        Ok(true)
    }

    /// Drop every record for `subscriber_id`. Returns how many were removed.
    pub async fn unregister(&self, category: EventCategory, subscriber_id: &str) -> Result<usize> {
        let _guard = self.locks[category.index()].lock().await;

        let Some(list) = self.store.get(category).await? else {
            return Ok(0);
        };

        let before = list.len();
        let filtered: Vec<SubscriberRecord> = list
            .into_iter()
            .filter(|r| r.subscriber_id != subscriber_id)
            .collect();
        let removed = before - filtered.len();

        self.store.set(category, &filtered).await?;
        if removed > 0 {
            info!(%category, subscriber_id, removed, "unregistered subscriber");
        }
        Ok(removed)
    }

    pub async fn subscribers(&self, category: EventCategory) -> Result<Vec<SubscriberRecord>> {
        Ok(self.store.get(category).await?.unwrap_or_default())
    }
}
