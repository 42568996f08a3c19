//! QueueStore - 順序付きリスト + 永続化
//!
//! # 設計原則
//! - in-memory の `VecDeque` が正本。変更のたびに丸ごと DurableKeyValueStore に書き戻す
//! - 書き込み失敗はログに残して飲み込む（キューは動き続ける）
//! - 読み込み失敗（壊れたデータ）は空キューとして扱う（fail-open）
//! - 重複検出はしない（同じリクエストを 2 回 add すれば 2 件になる）

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{QueuedRequest, RequestId};
use crate::error::StoreError;
use crate::ports::DurableKeyValueStore;

pub struct QueueStore {
    items: VecDeque<QueuedRequest>,
    backend: Arc<dyn DurableKeyValueStore>,
    key: String,
}

impl QueueStore {
    /// Load persisted items, dropping the ones at least `max_age` old.
    ///
    /// Unreadable or unparseable data yields an empty queue; individual
    /// malformed entries are skipped.
    pub fn load(
        backend: Arc<dyn DurableKeyValueStore>,
        key: impl Into<String>,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Self {
        let key = key.into();
        let items = match read_items(backend.as_ref(), &key) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to load retry queue from storage");
                Vec::new()
            }
        };

        let total = items.len();
        let items: VecDeque<QueuedRequest> = items
            .into_iter()
            .filter(|item| !item.is_stale(now, max_age))
            .collect();
        if items.len() < total {
            tracing::debug!(
                key = %key,
                dropped = total - items.len(),
                "dropped stale requests on load"
            );
        }

        Self {
            items,
            backend,
            key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head(&self) -> Option<&QueuedRequest> {
        self.items.front()
    }

    pub fn get(&self, id: RequestId) -> Option<&QueuedRequest> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Creation time of the oldest pending item.
    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|item| item.timestamp).min()
    }

    /// Copy of the current list, head first.
    pub fn snapshot(&self) -> Vec<QueuedRequest> {
        self.items.iter().cloned().collect()
    }

    /// High priority goes to the head, everything else to the tail.
    pub fn insert(&mut self, item: QueuedRequest) {
        if item.priority.goes_to_head() {
            self.items.push_front(item);
        } else {
            self.items.push_back(item);
        }
        self.persist();
    }

    pub fn remove(&mut self, id: RequestId) -> Option<QueuedRequest> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(index);
        self.persist();
        removed
    }

    /// Returns the number of items that were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        self.persist();
        count
    }

    /// Increment `retry_count` of `id` and persist. Returns the new count,
    /// or `None` if the item is no longer queued.
    pub fn record_failed_attempt(&mut self, id: RequestId) -> Option<u32> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.retry_count = item.retry_count.saturating_add(1);
        let retry_count = item.retry_count;
        self.persist();
        Some(retry_count)
    }

    /// Write the current list even if nothing changed.
    pub fn flush(&self) {
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = write_items(self.backend.as_ref(), &self.key, &self.items) {
            tracing::warn!(key = %self.key, error = %e, "failed to save retry queue to storage");
        }
    }
}

fn read_items(
    backend: &dyn DurableKeyValueStore,
    key: &str,
) -> Result<Vec<QueuedRequest>, StoreError> {
    let Some(raw) = backend.get(key)? else {
        return Ok(Vec::new());
    };

    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
    let mut items = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<QueuedRequest>(value) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(key, error = %e, "skipping malformed queued request"),
        }
    }
    Ok(items)
}

fn write_items(
    backend: &dyn DurableKeyValueStore,
    key: &str,
    items: &VecDeque<QueuedRequest>,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(items)?;
    backend.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewRequest, Priority};
    use crate::impls::InMemoryStore;
    use chrono::TimeZone;
    use ulid::Ulid;

    const KEY: &str = "vv_api_retry_queue";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn item(url: &str, priority: Priority, created: DateTime<Utc>) -> QueuedRequest {
        QueuedRequest::from_new(
            NewRequest::post(url).with_priority(priority),
            RequestId::from_ulid(Ulid::new()),
            created,
            3,
        )
    }

    fn empty_store(backend: Arc<dyn DurableKeyValueStore>) -> QueueStore {
        QueueStore::load(backend, KEY, now(), Duration::hours(24))
    }

    fn urls(store: &QueueStore) -> Vec<String> {
        store.snapshot().into_iter().map(|i| i.url).collect()
    }

    #[test]
    fn high_priority_goes_to_head_others_to_tail() {
        let mut store = empty_store(Arc::new(InMemoryStore::new()));

        store.insert(item("a", Priority::Normal, now()));
        store.insert(item("b", Priority::Low, now()));
        store.insert(item("c", Priority::High, now()));
        store.insert(item("d", Priority::Normal, now()));
        store.insert(item("e", Priority::High, now()));

        // Low is not reordered behind Normal: single list, tail insertion.
        assert_eq!(urls(&store), vec!["e", "c", "a", "b", "d"]);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let backend: Arc<dyn DurableKeyValueStore> = Arc::new(InMemoryStore::new());
        let mut store = empty_store(backend.clone());

        let first = item("a", Priority::Normal, now());
        let first_id = first.id;
        store.insert(first);
        store.insert(item("b", Priority::Normal, now()));
        store.record_failed_attempt(first_id);
        store.remove(first_id);

        let reloaded = empty_store(backend);
        assert_eq!(urls(&reloaded), vec!["b"]);
    }

    #[test]
    fn reload_reproduces_items() {
        let backend: Arc<dyn DurableKeyValueStore> = Arc::new(InMemoryStore::new());
        let mut store = empty_store(backend.clone());
        let mut original = item("https://api/verses", Priority::High, now());
        original.body = Some(r#"{"n":1}"#.into());
        store.insert(original.clone());
        store.record_failed_attempt(original.id);

        let reloaded = empty_store(backend);
        let mut expected = original;
        expected.retry_count = 1;
        assert_eq!(reloaded.snapshot(), vec![expected]);
    }

    #[test]
    fn stale_items_are_dropped_on_load() {
        let backend: Arc<dyn DurableKeyValueStore> = Arc::new(InMemoryStore::new());
        let mut store = empty_store(backend.clone());
        store.insert(item("old", Priority::Normal, now() - Duration::hours(25)));
        store.insert(item("edge", Priority::Normal, now() - Duration::hours(24)));
        store.insert(item("fresh", Priority::Normal, now() - Duration::hours(23)));

        let reloaded = empty_store(backend);
        assert_eq!(urls(&reloaded), vec!["fresh"]);
    }

    #[test]
    fn corrupt_data_loads_as_empty() {
        let backend: Arc<dyn DurableKeyValueStore> =
            Arc::new(InMemoryStore::with_value(KEY, "{not json"));

        let store = empty_store(backend);

        assert!(store.is_empty());
    }

    #[test]
    fn non_array_data_loads_as_empty() {
        let backend: Arc<dyn DurableKeyValueStore> =
            Arc::new(InMemoryStore::with_value(KEY, r#"{"id":"x"}"#));

        assert!(empty_store(backend).is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let good = item("good", Priority::Normal, now());
        let raw = format!(
            "[{}, {{\"url\": \"missing fields\"}}]",
            serde_json::to_string(&good).unwrap()
        );
        let backend: Arc<dyn DurableKeyValueStore> = Arc::new(InMemoryStore::with_value(KEY, raw));

        let store = empty_store(backend);

        assert_eq!(store.snapshot(), vec![good]);
    }

    #[test]
    fn record_failed_attempt_on_missing_item_is_none() {
        let mut store = empty_store(Arc::new(InMemoryStore::new()));
        assert_eq!(
            store.record_failed_attempt(RequestId::from_ulid(Ulid::new())),
            None
        );
    }

    #[test]
    fn write_failures_are_swallowed() {
        struct ReadOnly;
        impl DurableKeyValueStore for ReadOnly {
            fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
                Ok(None)
            }
            fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
                Err(StoreError::Other("quota exceeded".into()))
            }
        }

        let mut store = empty_store(Arc::new(ReadOnly));
        store.insert(item("a", Priority::Normal, now()));

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_reports_dropped_count() {
        let mut store = empty_store(Arc::new(InMemoryStore::new()));
        store.insert(item("a", Priority::Normal, now()));
        store.insert(item("b", Priority::Normal, now()));

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.oldest_timestamp(), None);
    }
}
