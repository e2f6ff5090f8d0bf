//! Per-topic read tracking with debounced persistence.
//!
//! Marks arrive in bursts while someone pages through cards, so writes
//! are coalesced: each mutation re-arms a short timer and only the last
//! snapshot in a burst reaches storage.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::warn;

use crate::storage::KeyValueStore;

/// Storage key for the read map.
pub const READ_KEY: &str = "read:v1";

/// How long a burst of marks may grow before it is persisted.
pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(150);

type ReadMap = HashMap<String, HashSet<String>>;

/// Which articles have been read, grouped by topic slug.
///
/// Persisted as `{ "<topic>": ["<article id>", ...] }`. Ids are kept as
/// strings to match what earlier app versions wrote. All storage
/// failures are logged and absorbed; read marks are never worth an
/// error surface.
pub struct ReadStateStore {
    kv: Arc<dyn KeyValueStore>,
    by_topic: Mutex<ReadMap>,
    saver: Mutex<Option<JoinHandle<()>>>,
}

impl ReadStateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            by_topic: Mutex::new(HashMap::new()),
            saver: Mutex::new(None),
        }
    }

    /// Hydrate from storage. Topics whose id list is empty or null are
    /// pruned; unreadable payloads start the state empty.
    pub async fn load(&self) {
        let map = match self.kv.get_item(READ_KEY).await {
            Ok(Some(raw)) => parse_persisted(&raw),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Read-state load failed, starting empty: {}", e);
                HashMap::new()
            }
        };
        *self.lock_map() = map;
    }

    /// Record an article as read. No-op when the topic slug is blank or
    /// the mark is already present; only real changes schedule a write.
    pub fn mark_read(&self, id: i64, topic: Option<&str>) {
        let slug = topic.unwrap_or("").trim();
        if slug.is_empty() {
            return;
        }

        let snapshot = {
            let mut by_topic = self.lock_map();
            let set = by_topic.entry(slug.to_string()).or_default();
            if !set.insert(id.to_string()) {
                return;
            }
            by_topic.clone()
        };

        self.schedule_persist(snapshot);
    }

    pub fn is_read(&self, id: i64, topic: Option<&str>) -> bool {
        let slug = topic.unwrap_or("").trim();
        if slug.is_empty() {
            return false;
        }

        self.lock_map()
            .get(slug)
            .map(|set| set.contains(&id.to_string()))
            .unwrap_or(false)
    }

    /// Number of read articles per topic.
    pub fn read_count_by_topic(&self) -> HashMap<String, usize> {
        self.lock_map()
            .iter()
            .map(|(slug, set)| (slug.clone(), set.len()))
            .collect()
    }

    /// Wipe all marks, in memory and in storage. Cancels a pending
    /// debounced write so a burst from just before the clear cannot
    /// resurrect itself.
    pub async fn clear_all(&self) {
        let pending = self.lock_saver().take();
        if let Some(task) = pending {
            task.abort();
        }

        if let Err(e) = self.kv.set_item(READ_KEY, "{}").await {
            warn!("Read-state clear failed: {}", e);
        }
        self.lock_map().clear();
    }

    fn schedule_persist(&self, snapshot: ReadMap) {
        let kv = self.kv.clone();
        let task = tokio::spawn(async move {
            time::sleep(PERSIST_DEBOUNCE).await;
            let payload = serialize_persisted(&snapshot);
            if let Err(e) = kv.set_item(READ_KEY, &payload).await {
                warn!("Read-state write failed: {}", e);
            }
        });

        if let Some(prev) = self.lock_saver().replace(task) {
            prev.abort();
        }
    }

    fn lock_map(&self) -> MutexGuard<'_, ReadMap> {
        self.by_topic.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_saver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.saver.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_persisted(raw: &str) -> ReadMap {
    let parsed: HashMap<String, Option<Vec<String>>> = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Read-state payload malformed, starting empty: {}", e);
            return HashMap::new();
        }
    };

    let mut map = HashMap::new();
    for (slug, ids) in parsed {
        let set: HashSet<String> = ids.unwrap_or_default().into_iter().collect();
        if !set.is_empty() {
            map.insert(slug, set);
        }
    }
    map
}

fn serialize_persisted(map: &ReadMap) -> String {
    let shape: HashMap<&String, Vec<&String>> = map
        .iter()
        .filter(|(_, set)| !set.is_empty())
        .map(|(slug, set)| (slug, set.iter().collect()))
        .collect();
    serde_json::to_string(&shape).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::app::Result;
    use crate::storage::MemoryKv;

    struct CountingKv {
        inner: MemoryKv,
        writes: AtomicUsize,
    }

    impl CountingKv {
        fn new() -> Self {
            Self {
                inner: MemoryKv::new(),
                writes: AtomicUsize::new(0),
            }
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyValueStore for CountingKv {
        async fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, key: &str) -> Result<()> {
            self.inner.remove_item(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_read_is_idempotent() {
        let store = ReadStateStore::new(Arc::new(MemoryKv::new()));

        store.mark_read(7, Some("physics"));
        store.mark_read(7, Some("physics"));

        assert!(store.is_read(7, Some("physics")));
        assert!(!store.is_read(8, Some("physics")));
        assert_eq!(store.read_count_by_topic().get("physics"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_topic_is_noop() {
        let store = ReadStateStore::new(Arc::new(MemoryKv::new()));

        store.mark_read(7, None);
        store.mark_read(7, Some("   "));

        assert!(!store.is_read(7, None));
        assert!(store.read_count_by_topic().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_marks_writes_once() {
        let kv = Arc::new(CountingKv::new());
        let store = ReadStateStore::new(kv.clone());

        store.mark_read(1, Some("physics"));
        store.mark_read(2, Some("physics"));
        store.mark_read(3, Some("history"));

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(kv.writes(), 1);

        // The single write carries the whole burst
        let raw = kv.get_item(READ_KEY).await.unwrap().unwrap();
        let parsed: HashMap<String, Vec<String>> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["physics"].len(), 2);
        assert_eq!(parsed["history"].len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redundant_mark_schedules_no_write() {
        let kv = Arc::new(CountingKv::new());
        let store = ReadStateStore::new(kv.clone());

        store.mark_read(1, Some("physics"));
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(kv.writes(), 1);

        store.mark_read(1, Some("physics"));
        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(kv.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_mark_rearms_the_timer() {
        let kv = Arc::new(CountingKv::new());
        let store = ReadStateStore::new(kv.clone());

        store.mark_read(1, Some("physics"));
        time::sleep(Duration::from_millis(100)).await;
        store.mark_read(2, Some("physics"));
        time::sleep(Duration::from_millis(100)).await;

        // 200ms in, but the re-armed timer still has 50ms to go
        assert_eq!(kv.writes(), 0);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(kv.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_prunes_empty_and_null_topics() {
        let kv = Arc::new(MemoryKv::new());
        kv.set_item(
            READ_KEY,
            r#"{"physics": ["1", "2"], "history": [], "math": null}"#,
        )
        .await
        .unwrap();

        let store = ReadStateStore::new(kv);
        store.load().await;

        let counts = store.read_count_by_topic();
        assert_eq!(counts.get("physics"), Some(&2));
        assert!(!counts.contains_key("history"));
        assert!(!counts.contains_key("math"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_malformed_starts_empty() {
        let kv = Arc::new(MemoryKv::new());
        kv.set_item(READ_KEY, "not json at all").await.unwrap();

        let store = ReadStateStore::new(kv);
        store.load().await;
        assert!(store.read_count_by_topic().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_marks_survive_reload() {
        let kv = Arc::new(MemoryKv::new());
        let store = ReadStateStore::new(kv.clone());
        store.mark_read(7, Some("physics"));
        time::sleep(Duration::from_millis(200)).await;

        let reopened = ReadStateStore::new(kv);
        reopened.load().await;
        assert!(reopened.is_read(7, Some("physics")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_write() {
        let kv = Arc::new(CountingKv::new());
        let store = ReadStateStore::new(kv.clone());

        store.mark_read(1, Some("physics"));
        // Clear lands before the debounce elapses
        store.clear_all().await;
        time::sleep(Duration::from_millis(300)).await;

        assert_eq!(kv.writes(), 1);
        let raw = kv.get_item(READ_KEY).await.unwrap().unwrap();
        assert_eq!(raw, "{}");
        assert!(!store.is_read(1, Some("physics")));
        assert!(store.read_count_by_topic().is_empty());
    }
}
