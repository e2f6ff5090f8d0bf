//! Loader for the reader's saved articles.
//!
//! Saved ids live in settings; this loader turns them into full
//! articles on demand. Same fencing rule as the feed: only the newest
//! request may touch the snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::ContentApi;
use crate::domain::Article;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedSnapshot {
    pub items: Vec<Article>,
    pub loading: bool,
    pub refreshing: bool,
    pub error: Option<String>,
}

pub struct SavedLoader {
    api: Arc<dyn ContentApi>,
    state: Mutex<SavedSnapshot>,
    req_id: AtomicU64,
}

impl SavedLoader {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self {
            api,
            state: Mutex::new(SavedSnapshot {
                loading: true,
                ..SavedSnapshot::default()
            }),
            req_id: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> SavedSnapshot {
        self.lock_state().clone()
    }

    /// Fetch the articles for `saved_ids`, in that order. An empty list
    /// short-circuits without a network call.
    pub async fn load(&self, saved_ids: &[i64]) {
        let req_id = self.req_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock_state().error = None;

        if saved_ids.is_empty() {
            let mut state = self.lock_state();
            state.items.clear();
            Self::clear_flags(&mut state);
            return;
        }

        match self.api.fetch_articles_by_ids(saved_ids).await {
            Ok(items) => {
                if !self.is_current(req_id) {
                    return;
                }
                let mut state = self.lock_state();
                state.items = items;
                Self::clear_flags(&mut state);
            }
            Err(e) => {
                if !self.is_current(req_id) {
                    return;
                }
                let mut state = self.lock_state();
                state.error = Some(e.to_string());
                Self::clear_flags(&mut state);
            }
        }
    }

    /// Pull-to-refresh: reload while keeping the current items visible.
    pub async fn refresh(&self, saved_ids: &[i64]) {
        self.lock_state().refreshing = true;
        self.load(saved_ids).await;
    }

    /// Blank the screen and reload, for when the id set itself changed.
    pub async fn reload(&self, saved_ids: &[i64]) {
        {
            let mut state = self.lock_state();
            state.loading = true;
            state.items.clear();
        }
        self.load(saved_ids).await;
    }

    fn is_current(&self, req_id: u64) -> bool {
        self.req_id.load(Ordering::SeqCst) == req_id
    }

    fn clear_flags(state: &mut SavedSnapshot) {
        state.loading = false;
        state.refreshing = false;
    }

    fn lock_state(&self) -> MutexGuard<'_, SavedSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
