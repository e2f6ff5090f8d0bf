use std::sync::Arc;

use tracing::warn;

use crate::domain::PendingSubmission;
use crate::storage::KeyValueStore;

/// Storage key the queue lives under. Versioned so a future format
/// change can migrate instead of misparsing.
pub const QUEUE_KEY: &str = "pendingSubmissions:v1";

/// Persistence for the submission queue, one JSON array under one key.
///
/// Deliberately fail-open in both directions: unreadable storage reads
/// as an empty queue, and write failures are logged and swallowed so
/// the in-memory queue stays usable. Queued questions are convenience
/// data; storage trouble must never make submitting or reading worse.
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
}

impl QueueStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Read the whole queue, oldest first. A missing key, unreadable
    /// storage or a malformed payload all come back empty.
    pub async fn read_all(&self) -> Vec<PendingSubmission> {
        let raw = match self.kv.get_item(QUEUE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Queue read failed, treating as empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!("Queue payload malformed, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Persist the queue. Best effort; failures are logged and dropped.
    pub async fn write_all(&self, items: &[PendingSubmission]) {
        let payload = match serde_json::to_string(items) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Queue serialization failed: {}", e);
                return;
            }
        };

        if let Err(e) = self.kv.set_item(QUEUE_KEY, &payload).await {
            warn!("Queue write failed, keeping in-memory state: {}", e);
        }
    }

    /// Append one item and return the queue as now persisted.
    pub async fn append(&self, item: PendingSubmission) -> Vec<PendingSubmission> {
        let mut items = self.read_all().await;
        items.push(item);
        self.write_all(&items).await;
        items
    }

    /// Remove the item with the given id and return the remaining queue.
    /// Re-reads before rewriting so an append that raced in is kept.
    pub async fn remove_by_id(&self, id: &str) -> Vec<PendingSubmission> {
        let mut items = self.read_all().await;
        items.retain(|item| item.id != id);
        self.write_all(&items).await;
        items
    }
}
