//! Paginated feed loading with an offline cache and stale-response
//! fencing.
//!
//! Every load tags itself with a fresh request id; a response whose id
//! is no longer current is dropped on the floor, state and flags alike.
//! Whatever order responses land in, the snapshot always reflects the
//! newest request.

pub mod saved;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::api::ContentApi;
use crate::connectivity::ConnectivityHandle;
use crate::domain::Article;
use crate::storage::KeyValueStore;

pub use saved::{SavedLoader, SavedSnapshot};

/// Error text shown when offline with nothing cached.
pub const OFFLINE_NO_CACHE: &str = "Offline. No cached feed yet.";

/// What a feed screen renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    pub items: Vec<Article>,
    /// Last page successfully loaded.
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub loading_more: bool,
    pub refreshing: bool,
    pub error: Option<String>,
}

/// Feed loader for a topic selection.
///
/// Page 1 of every topic selection is cached as "the last feed" and
/// served when the network is out. The page size is part of the cache
/// key, so changing it never misreads an old cache entry.
pub struct FeedLoader {
    api: Arc<dyn ContentApi>,
    kv: Arc<dyn KeyValueStore>,
    connectivity: ConnectivityHandle,
    page_size: u32,
    keep_items_while_reloading: bool,
    topics: Mutex<Vec<String>>,
    state: Mutex<FeedSnapshot>,
    req_id: AtomicU64,
}

impl FeedLoader {
    pub fn new(
        api: Arc<dyn ContentApi>,
        kv: Arc<dyn KeyValueStore>,
        connectivity: ConnectivityHandle,
        page_size: u32,
    ) -> Self {
        Self::with_options(api, kv, connectivity, page_size, false)
    }

    /// `keep_items_while_reloading` leaves the current items on screen
    /// through a reload instead of blanking them.
    pub fn with_options(
        api: Arc<dyn ContentApi>,
        kv: Arc<dyn KeyValueStore>,
        connectivity: ConnectivityHandle,
        page_size: u32,
        keep_items_while_reloading: bool,
    ) -> Self {
        Self {
            api,
            kv,
            connectivity,
            page_size,
            keep_items_while_reloading,
            topics: Mutex::new(Vec::new()),
            state: Mutex::new(FeedSnapshot {
                page: 1,
                has_more: true,
                loading: true,
                ..FeedSnapshot::default()
            }),
            req_id: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.lock_state().clone()
    }

    /// Hard reload from page 1: used for the initial load and after
    /// anything that invalidates the whole list.
    pub async fn reload(&self) {
        {
            let mut state = self.lock_state();
            state.loading = true;
            if !self.keep_items_while_reloading {
                state.items.clear();
            }
            state.has_more = true;
        }
        self.load(1, true).await;
    }

    /// Set the filter without touching the network. For hydrating a
    /// persisted selection before the first `reload`.
    pub fn prime_topics(&self, topics: Vec<String>) {
        *self.lock_topics() = topics;
    }

    /// Swap the topic filter. Reloads only when the selection really
    /// changed; reordering the same topics is not a change.
    pub async fn set_topics(&self, topics: Vec<String>) {
        let before = self.cache_key();
        *self.lock_topics() = topics;
        if self.cache_key() != before {
            debug!("Feed filter changed, reloading");
            self.reload().await;
        }
    }

    /// Pull-to-refresh: reload page 1 while keeping items on screen.
    pub async fn refresh(&self) {
        self.lock_state().refreshing = true;
        self.load(1, true).await;
    }

    /// Load the next page, if nothing else is going on. Quietly refuses
    /// while any load is in flight, after the last page, or offline.
    pub async fn load_more(&self) {
        let next_page = {
            let mut state = self.lock_state();
            if state.loading || state.loading_more || state.refreshing || !state.has_more {
                return;
            }
            if self.connectivity.is_offline() {
                return;
            }
            state.loading_more = true;
            state.page + 1
        };
        self.load(next_page, false).await;
    }

    async fn load(&self, page_to_load: u32, replace: bool) {
        let req_id = self.req_id.fetch_add(1, Ordering::SeqCst) + 1;

        if self.connectivity.is_offline() {
            let cached = self.read_cache().await;
            if !self.is_current(req_id) {
                return;
            }

            let mut state = self.lock_state();
            match cached {
                Some(items) => {
                    state.items = items;
                    state.has_more = false;
                    state.error = None;
                }
                None => {
                    state.items = Vec::new();
                    state.error = Some(OFFLINE_NO_CACHE.to_string());
                }
            }
            Self::clear_flags(&mut state);
            return;
        }

        let topics = self.lock_topics().clone();
        match self.api.fetch_feed(&topics, page_to_load, self.page_size).await {
            Ok(data) => {
                let cache_payload = if page_to_load == 1 {
                    serde_json::to_string(&data).ok()
                } else {
                    None
                };

                if !self.is_current(req_id) {
                    return;
                }
                {
                    let mut state = self.lock_state();
                    state.error = None;
                    state.has_more = data.len() as u32 == self.page_size;
                    state.page = page_to_load;
                    if replace {
                        state.items = data;
                    } else {
                        state.items.extend(data);
                    }
                    Self::clear_flags(&mut state);
                }

                if let Some(payload) = cache_payload {
                    self.write_cache(&payload).await;
                }
            }
            Err(e) => {
                if page_to_load == 1 {
                    // Network down on a fresh load: the cached feed is
                    // better than an error screen
                    let cached = self.read_cache().await;
                    if !self.is_current(req_id) {
                        return;
                    }

                    let mut state = self.lock_state();
                    match cached {
                        Some(items) => {
                            state.items = items;
                            state.has_more = false;
                            state.error = None;
                        }
                        None => state.error = Some(e.to_string()),
                    }
                    Self::clear_flags(&mut state);
                } else {
                    if !self.is_current(req_id) {
                        return;
                    }
                    let mut state = self.lock_state();
                    state.error = Some(e.to_string());
                    Self::clear_flags(&mut state);
                }
            }
        }
    }

    fn cache_key(&self) -> String {
        let topics = self.lock_topics();
        let key = if topics.is_empty() {
            "ALL".to_string()
        } else {
            let mut sorted = topics.clone();
            sorted.sort();
            sorted.join(",")
        };
        format!("feed:{}:{}", key, self.page_size)
    }

    async fn read_cache(&self) -> Option<Vec<Article>> {
        let key = self.cache_key();
        match self.kv.get_item(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(items) => Some(items),
                Err(e) => {
                    warn!("Feed cache malformed, ignoring: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Feed cache read failed: {}", e);
                None
            }
        }
    }

    async fn write_cache(&self, payload: &str) {
        let key = self.cache_key();
        if let Err(e) = self.kv.set_item(&key, payload).await {
            warn!("Feed cache write failed: {}", e);
        }
    }

    fn is_current(&self, req_id: u64) -> bool {
        self.req_id.load(Ordering::SeqCst) == req_id
    }

    fn clear_flags(state: &mut FeedSnapshot) {
        state.loading = false;
        state.loading_more = false;
        state.refreshing = false;
    }

    fn lock_state(&self) -> MutexGuard<'_, FeedSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_topics(&self) -> MutexGuard<'_, Vec<String>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }
}
