//! Topic catalog: the filter chips the reader picks from.
//!
//! Loads cache-first for an instant render, then refreshes from the
//! network and rewrites the cache. Every list that leaves this module
//! is normalized: sentinel entries stripped, slugs deduped, and a
//! synthetic "All" entry in front.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::api::ContentApi;
use crate::domain::Topic;
use crate::storage::KeyValueStore;

/// Storage key for the cached topic list.
pub const TOPICS_KEY: &str = "topics:v1";

/// Strip sentinel slugs (`all`, `__clear`) and blanks, dedup
/// case-insensitively keeping the first occurrence, and prepend the
/// synthetic "All" entry. Counts ride along untouched.
pub fn normalize_topics(items: &[Topic]) -> Vec<Topic> {
    let mut seen = HashSet::new();
    let mut cleaned = vec![Topic::all()];

    for topic in items {
        let slug = topic.slug.trim();
        if slug.is_empty() {
            continue;
        }
        let lower = slug.to_lowercase();
        if lower == "all" || lower == "__clear" {
            continue;
        }
        if seen.insert(lower) {
            cleaned.push(Topic {
                slug: slug.to_string(),
                title: if topic.title.is_empty() {
                    slug.to_string()
                } else {
                    topic.title.clone()
                },
                count: topic.count,
            });
        }
    }

    cleaned
}

pub struct TopicCatalog {
    api: Arc<dyn ContentApi>,
    kv: Arc<dyn KeyValueStore>,
    topics: Mutex<Vec<Topic>>,
    loading: AtomicBool,
}

impl TopicCatalog {
    pub fn new(api: Arc<dyn ContentApi>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            kv,
            topics: Mutex::new(normalize_topics(&[])),
            loading: AtomicBool::new(true),
        }
    }

    /// Current normalized list; "All" is always present and first.
    pub fn topics(&self) -> Vec<Topic> {
        self.lock_topics().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Cache first, network second. A failed or empty fetch keeps
    /// whatever the cache gave us; with no cache either, the list
    /// degrades to the lone "All" entry.
    pub async fn load(&self) {
        self.loading.store(true, Ordering::SeqCst);

        let had_cache = match self.read_cache().await {
            Some(cached) => {
                *self.lock_topics() = cached;
                true
            }
            None => false,
        };

        match self.api.fetch_topics().await {
            Ok(remote) if !remote.is_empty() => {
                let normalized =
                    normalize_topics(&remote.into_iter().map(Topic::from).collect::<Vec<_>>());
                let payload = serde_json::to_string(&normalized).ok();
                *self.lock_topics() = normalized;
                if let Some(payload) = payload {
                    if let Err(e) = self.kv.set_item(TOPICS_KEY, &payload).await {
                        warn!("Topic cache write failed: {}", e);
                    }
                }
            }
            Ok(_) => {
                if !had_cache {
                    *self.lock_topics() = normalize_topics(&[]);
                }
            }
            Err(e) => {
                debug!("Topic fetch failed, keeping local list: {}", e);
                if !had_cache {
                    *self.lock_topics() = normalize_topics(&[]);
                }
            }
        }

        self.loading.store(false, Ordering::SeqCst);
    }

    async fn read_cache(&self) -> Option<Vec<Topic>> {
        match self.kv.get_item(TOPICS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Topic>>(&raw) {
                Ok(parsed) if !parsed.is_empty() => Some(normalize_topics(&parsed)),
                Ok(_) => None,
                Err(e) => {
                    warn!("Topic cache malformed, ignoring: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Topic cache read failed: {}", e);
                None
            }
        }
    }

    fn lock_topics(&self) -> MutexGuard<'_, Vec<Topic>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::app::{FreshetError, Result};
    use crate::domain::{Article, SubmissionReceipt, TopicSummary};
    use crate::storage::MemoryKv;

    fn topic(slug: &str, title: &str) -> Topic {
        Topic {
            slug: slug.to_string(),
            title: title.to_string(),
            count: None,
        }
    }

    fn summary(slug: &str, title: &str, count: i64) -> TopicSummary {
        TopicSummary {
            slug: slug.to_string(),
            title: title.to_string(),
            count,
        }
    }

    struct TopicApi {
        remote: Result<Vec<TopicSummary>>,
    }

    impl TopicApi {
        fn returning(remote: Vec<TopicSummary>) -> Self {
            Self { remote: Ok(remote) }
        }

        fn failing() -> Self {
            Self {
                remote: Err(FreshetError::Api {
                    status: 500,
                    body: "server error".to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl ContentApi for TopicApi {
        async fn fetch_feed(
            &self,
            _topics: &[String],
            _page: u32,
            _limit: u32,
        ) -> Result<Vec<Article>> {
            Ok(Vec::new())
        }

        async fn fetch_article_by_slug(&self, _slug: &str) -> Result<Option<Article>> {
            Ok(None)
        }

        async fn fetch_articles_by_ids(&self, _ids: &[i64]) -> Result<Vec<Article>> {
            Ok(Vec::new())
        }

        async fn fetch_topics(&self) -> Result<Vec<TopicSummary>> {
            match &self.remote {
                Ok(topics) => Ok(topics.clone()),
                Err(_) => Err(FreshetError::Api {
                    status: 500,
                    body: "server error".to_string(),
                }),
            }
        }

        async fn submit_question(
            &self,
            _question: &str,
            _topic: Option<&str>,
        ) -> Result<SubmissionReceipt> {
            Err(FreshetError::Other("not implemented".into()))
        }

        async fn health(&self) -> bool {
            true
        }
    }

    fn slugs(topics: &[Topic]) -> Vec<&str> {
        topics.iter().map(|t| t.slug.as_str()).collect()
    }

    #[test]
    fn test_normalize_strips_sentinels_and_dedups() {
        let raw = vec![
            topic("all", "All"),
            topic("physics", "Physics"),
            topic("Physics", "Physics again"),
            topic("__clear", "Clear"),
            topic("  ", "Blank"),
            topic("space", "Space"),
        ];

        let normalized = normalize_topics(&raw);
        assert_eq!(slugs(&normalized), vec!["all", "physics", "space"]);
        assert_eq!(normalized[1].title, "Physics");
    }

    #[test]
    fn test_normalize_title_falls_back_to_slug() {
        let normalized = normalize_topics(&[topic("history", "")]);
        assert_eq!(normalized[1].title, "history");
    }

    #[test]
    fn test_normalize_keeps_counts() {
        let mut with_count = topic("tech", "Tech");
        with_count.count = Some(7);
        let normalized = normalize_topics(&[with_count]);
        assert_eq!(normalized[1].count, Some(7));
    }

    #[tokio::test]
    async fn test_load_prefers_remote_and_caches() {
        let api = Arc::new(TopicApi::returning(vec![
            summary("physics", "Physics", 4),
            summary("space", "Space", 2),
        ]));
        let kv = Arc::new(MemoryKv::new());
        let catalog = TopicCatalog::new(api, kv.clone());

        catalog.load().await;

        let topics = catalog.topics();
        assert_eq!(slugs(&topics), vec!["all", "physics", "space"]);
        assert_eq!(topics[1].count, Some(4));
        assert!(!catalog.is_loading());

        let cached = kv.get_item(TOPICS_KEY).await.unwrap().unwrap();
        let parsed: Vec<Topic> = serde_json::from_str(&cached).unwrap();
        assert_eq!(slugs(&parsed), vec!["all", "physics", "space"]);
    }

    #[tokio::test]
    async fn test_load_serves_cache_when_remote_fails() {
        let kv = Arc::new(MemoryKv::new());
        let cached = serde_json::to_string(&vec![Topic::all(), topic("history", "History")])
            .unwrap();
        kv.set_item(TOPICS_KEY, &cached).await.unwrap();

        let catalog = TopicCatalog::new(Arc::new(TopicApi::failing()), kv);
        catalog.load().await;

        assert_eq!(slugs(&catalog.topics()), vec!["all", "history"]);
        assert!(!catalog.is_loading());
    }

    #[tokio::test]
    async fn test_load_degrades_to_all_only() {
        let catalog = TopicCatalog::new(Arc::new(TopicApi::failing()), Arc::new(MemoryKv::new()));
        catalog.load().await;

        assert_eq!(slugs(&catalog.topics()), vec!["all"]);
        assert!(!catalog.is_loading());
    }

    #[tokio::test]
    async fn test_empty_remote_keeps_cache() {
        let kv = Arc::new(MemoryKv::new());
        let cached = serde_json::to_string(&vec![Topic::all(), topic("history", "History")])
            .unwrap();
        kv.set_item(TOPICS_KEY, &cached).await.unwrap();

        let catalog = TopicCatalog::new(Arc::new(TopicApi::returning(Vec::new())), kv.clone());
        catalog.load().await;

        assert_eq!(slugs(&catalog.topics()), vec!["all", "history"]);
        assert!(kv.get_item(TOPICS_KEY).await.unwrap().is_some());
    }
}
