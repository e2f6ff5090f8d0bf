pub mod directus;
pub mod health;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{Article, SubmissionReceipt, TopicSummary};

pub use directus::DirectusClient;
pub use health::{run_health_check, HealthReport, HealthStatus};

#[async_trait]
pub trait ContentApi: Send + Sync {
    /// One page of the article feed, newest first. An empty `topics`
    /// slice means no topic filter.
    async fn fetch_feed(&self, topics: &[String], page: u32, limit: u32) -> Result<Vec<Article>>;

    async fn fetch_article_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    /// Articles for the given ids, returned in the order the ids were
    /// given. Unknown ids are silently absent from the result.
    async fn fetch_articles_by_ids(&self, ids: &[i64]) -> Result<Vec<Article>>;

    /// Topic catalog with per-topic article counts, most populous first.
    async fn fetch_topics(&self) -> Result<Vec<TopicSummary>>;

    /// Create a submission from question text. Implementations reject
    /// text that fails moderation before anything goes on the wire.
    async fn submit_question(
        &self,
        question: &str,
        topic: Option<&str>,
    ) -> Result<SubmissionReceipt>;

    /// Cheap reachability check. Never errors; anything short of a
    /// healthy answer is `false`.
    async fn health(&self) -> bool;
}
