use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::api::ContentApi;
use crate::app::Result;
use crate::bus::QueueBus;
use crate::domain::PendingSubmission;
use crate::moderation::validate_question;
use crate::queue::store::QueueStore;

/// What one delivery pass accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub sent: usize,
    pub left: usize,
}

/// The submission queue: validated questions go in, a delivery pass
/// drains them oldest-first whenever someone asks.
///
/// Keeps a session snapshot of the queue alongside the persisted copy;
/// the snapshot is what badges and screens read, and it tracks every
/// intended mutation even when the write underneath was swallowed.
pub struct SubmissionQueue {
    store: QueueStore,
    api: Arc<dyn ContentApi>,
    bus: QueueBus,
    pending: Mutex<Vec<PendingSubmission>>,
    flushing: AtomicBool,
}

impl SubmissionQueue {
    pub fn new(store: QueueStore, api: Arc<dyn ContentApi>, bus: QueueBus) -> Self {
        Self {
            store,
            api,
            bus,
            pending: Mutex::new(Vec::new()),
            flushing: AtomicBool::new(false),
        }
    }

    /// Validate, mask and append a question. A rejected question never
    /// touches the queue.
    pub async fn enqueue(&self, question: &str, topic: Option<String>) -> Result<PendingSubmission> {
        let clean = validate_question(question)?;
        let item = PendingSubmission::new(clean, topic);

        let items = self.store.append(item.clone()).await;
        debug!("Queued submission {} ({} pending)", item.id, items.len());
        self.set_pending(items);
        self.bus.notify();

        Ok(item)
    }

    /// Deliver queued submissions oldest-first until one fails.
    ///
    /// Each success is removed and persisted individually, so an
    /// interruption loses at most the item in flight, never a delivered
    /// one. At most one pass runs at a time; a second call while one is
    /// active reports `sent: 0` and the current pending count.
    pub async fn flush(&self) -> FlushOutcome {
        if self
            .flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return FlushOutcome {
                sent: 0,
                left: self.pending_count(),
            };
        }
        let _guard = FlushGuard(&self.flushing);

        let mut items = self.store.read_all().await;
        let snapshot = items.clone();
        let mut sent = 0;

        for item in snapshot {
            match self
                .api
                .submit_question(&item.question, item.topic.as_deref())
                .await
            {
                Ok(receipt) => {
                    debug!("Delivered submission {} as #{}", item.id, receipt.id);
                    sent += 1;
                    items = self.store.remove_by_id(&item.id).await;
                    self.set_pending(items.clone());
                    self.bus.notify();
                }
                Err(e) => {
                    debug!("Delivery stopped at {}: {}", item.id, e);
                    break;
                }
            }
        }

        if sent > 0 {
            info!("Flushed {} submissions, {} left", sent, items.len());
        }

        FlushOutcome {
            sent,
            left: items.len(),
        }
    }

    /// Re-read the persisted queue into the session snapshot.
    pub async fn reload(&self) -> Vec<PendingSubmission> {
        let items = self.store.read_all().await;
        self.set_pending(items.clone());
        items
    }

    /// Current session view of the queue.
    pub fn pending(&self) -> Vec<PendingSubmission> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn set_pending(&self, items: Vec<PendingSubmission>) {
        *self.pending.lock().unwrap_or_else(|e| e.into_inner()) = items;
    }
}

/// Clears the in-flight flag however the pass ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
