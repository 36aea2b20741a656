use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::catalog::EventCategory;
use crate::error::{Error, Result};
use crate::types::SubscriberRecord;

const KV_FILE: &str = "kv.json";

/// Shared key-value store. Plain get/set; no compare-and-swap.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// JSON-file backed store. Every `set` rewrites `kv.json` under the data dir.
pub struct JsonKvStore {
    entries: RwLock<HashMap<String, Value>>,
    path: Option<PathBuf>,
}

impl JsonKvStore {
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    pub async fn open(data_dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let path = data_dir.join(KV_FILE);
        let entries: HashMap<String, Value> = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Store(format!("failed to parse {KV_FILE}: {e}")))?
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), "opened key-value store");
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
        })
    }
}

#[async_trait]
impl KvStore for JsonKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    /// The in-memory value only changes once `kv.json` has been written.
    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write().await;
        let previous = entries.insert(key.to_string(), value);
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Err(e) = persist(path, &entries).await {
            match previous {
                Some(prev) => entries.insert(key.to_string(), prev),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

async fn persist(path: &Path, entries: &HashMap<String, Value>) -> Result<()> {
    let content = serde_json::to_string_pretty(entries)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::Store(format!("failed to write {KV_FILE}: {e}")))
}

pub fn subscription_key(category: EventCategory) -> String {
    format!("webhook:subscription:{category}")
}

/// Subscriber lists keyed by category, on top of a [`KvStore`].
#[derive(Clone)]
pub struct SubscriptionStore {
    kv: Arc<dyn KvStore>,
}

impl SubscriptionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// `None` when nothing was ever stored for the category. A value that is
    /// not a subscriber list is treated the same way.
    pub async fn get(&self, category: EventCategory) -> Result<Option<Vec<SubscriberRecord>>> {
        let key = subscription_key(category);
        let Some(value) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(list) => Ok(Some(list)),
            Err(e) => {
                warn!(%key, error = %e, "ignoring malformed subscription list");
                Ok(None)
            }
        }
    }

    pub async fn set(&self, category: EventCategory, list: &[SubscriberRecord]) -> Result<()> {
        let value = serde_json::to_value(list)?;
        self.kv.set(&subscription_key(category), value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_is_derived_from_category() {
        assert_eq!(
            subscription_key(EventCategory::CallCreated),
            "webhook:subscription:call-created"
        );
    }

    #[tokio::test]
    async fn absent_key_reads_as_none() {
        let store = SubscriptionStore::new(Arc::new(JsonKvStore::in_memory()));
        assert_eq!(store.get(EventCategory::CallAnalyzed).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_list_is_distinct_from_absent() {
        let store = SubscriptionStore::new(Arc::new(JsonKvStore::in_memory()));
        store.set(EventCategory::CallAnalyzed, &[]).await.unwrap();
        assert_eq!(store.get(EventCategory::CallAnalyzed).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn stores_records_in_wire_shape() {
        let kv = Arc::new(JsonKvStore::in_memory());
        let store = SubscriptionStore::new(kv.clone());
        store
            .set(
                EventCategory::CallCreated,
                &[
                    SubscriberRecord::new("blockA", None),
                    SubscriberRecord::new("blockB", Some("W1")),
                ],
            )
            .await
            .unwrap();

        let raw = kv.get("webhook:subscription:call-created").await.unwrap();
        assert_eq!(
            raw,
            Some(json!([
                { "blockId": "blockA" },
                { "blockId": "blockB", "workspaceId": "W1" }
            ]))
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let kv = JsonKvStore::open(dir.path().to_path_buf()).await.unwrap();
        kv.set("kept", json!([1])).await.unwrap();
        std::fs::remove_file(dir.path().join(KV_FILE)).unwrap();
        std::fs::create_dir(dir.path().join(KV_FILE)).unwrap();

        let err = kv.set("fresh", json!([2])).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(kv.get("fresh").await.unwrap(), None);

        assert!(kv.set("kept", json!([3])).await.is_err());
        assert_eq!(kv.get("kept").await.unwrap(), Some(json!([1])));
    }

    #[tokio::test]
    async fn malformed_value_reads_as_none() {
        let kv = Arc::new(JsonKvStore::in_memory());
        kv.set("webhook:subscription:call-created", json!({"not": "a list"}))
            .await
            .unwrap();
        let store = SubscriptionStore::new(kv);
        assert_eq!(store.get(EventCategory::CallCreated).await.unwrap(), None);
    }
}
