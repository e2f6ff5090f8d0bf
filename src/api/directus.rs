use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::api::ContentApi;
use crate::app::{FreshetError, Result};
use crate::domain::{Article, SubmissionReceipt, SubmissionStatus, TopicSummary};
use crate::moderation::validate_question;

const ARTICLE_FIELDS: &str =
    "id,slug,title,excerpt,body1,body2,source1,source2,topic.id,topic.slug,topic.title";
const TOPIC_FIELDS: &str = "slug,title,order";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a Directus-backed content server.
///
/// Collections: `articles` (the feed), `topics` (the catalog) and
/// `submissions` (reader questions). Reads use the items endpoint with
/// Directus query params; creates ask for the stored representation back.
pub struct DirectusClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl DirectusClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent("freshet/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            base_url,
            token,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FreshetError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn post_json<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(FreshetError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Raw reachability probe for diagnostics: HTTP status plus the start
    /// of the body, or the transport error.
    pub async fn health_detail(&self) -> String {
        let url = format!("{}/server/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                let head: String = body.chars().take(120).collect();
                format!("{}:{}", status, head)
            }
            Err(e) => format!("ERR:{}", e),
        }
    }
}

#[async_trait]
impl ContentApi for DirectusClient {
    async fn fetch_feed(&self, topics: &[String], page: u32, limit: u32) -> Result<Vec<Article>> {
        let mut query = vec![
            ("fields", ARTICLE_FIELDS.to_string()),
            ("sort", "-id".to_string()),
            ("limit", limit.to_string()),
            ("page", page.to_string()),
        ];
        if !topics.is_empty() {
            let filter = serde_json::json!({ "topic": { "_in": topics } });
            query.push(("filter", filter.to_string()));
        }

        let response: ItemsResponse<RawArticle> = self.get_json("/items/articles", &query).await?;
        Ok(response.data.into_iter().map(Article::from).collect())
    }

    async fn fetch_article_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let filter = serde_json::json!({ "slug": { "_eq": slug } });
        let query = vec![
            ("fields", ARTICLE_FIELDS.to_string()),
            ("filter", filter.to_string()),
            ("limit", "1".to_string()),
        ];

        let response: ItemsResponse<RawArticle> = self.get_json("/items/articles", &query).await?;
        Ok(response.data.into_iter().next().map(Article::from))
    }

    async fn fetch_articles_by_ids(&self, ids: &[i64]) -> Result<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = serde_json::json!({ "id": { "_in": ids } });
        let query = vec![
            ("fields", ARTICLE_FIELDS.to_string()),
            ("filter", filter.to_string()),
            ("limit", ids.len().to_string()),
        ];

        let response: ItemsResponse<RawArticle> = self.get_json("/items/articles", &query).await?;
        let mut articles: Vec<Article> = response.data.into_iter().map(Article::from).collect();
        restore_id_order(&mut articles, ids);
        Ok(articles)
    }

    async fn fetch_topics(&self) -> Result<Vec<TopicSummary>> {
        // Either leg may fail on its own; the catalog degrades instead of
        // erroring as long as one of them answers.
        let rows = match self
            .get_json::<ItemsResponse<RawTopicRow>>(
                "/items/topics",
                &[
                    ("fields", TOPIC_FIELDS.to_string()),
                    ("sort", "order,title".to_string()),
                    ("limit", "100".to_string()),
                ],
            )
            .await
        {
            Ok(response) => response.data,
            Err(e) => {
                debug!("Topic listing unavailable: {}", e);
                Vec::new()
            }
        };

        let counts = match self
            .get_json::<ItemsResponse<RawCountRow>>(
                "/items/articles",
                &[
                    ("aggregate[count]", "*".to_string()),
                    ("groupBy", "topic.slug".to_string()),
                    ("fields", "topic.slug".to_string()),
                    ("limit", "-1".to_string()),
                ],
            )
            .await
        {
            Ok(response) => {
                let mut map = HashMap::new();
                for row in response.data {
                    let slug = row
                        .topic
                        .and_then(|t| t.slug)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default();
                    if slug.is_empty() || slug.eq_ignore_ascii_case("all") {
                        continue;
                    }
                    map.insert(slug, row.count);
                }
                map
            }
            Err(e) => {
                debug!("Topic counts unavailable: {}", e);
                HashMap::new()
            }
        };

        Ok(merge_topics(rows, counts))
    }

    async fn submit_question(
        &self,
        question: &str,
        topic: Option<&str>,
    ) -> Result<SubmissionReceipt> {
        let clean = validate_question(question)?;
        let body = serde_json::json!({ "question": clean, "topic": topic });

        let response: ItemResponse<RawReceipt> = self.post_json("/items/submissions", &body).await?;
        let raw = response.data.unwrap_or_default();

        Ok(SubmissionReceipt {
            id: raw.id,
            status: raw.status,
            created_at: raw.created_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
        })
    }

    async fn health(&self) -> bool {
        let url = format!("{}/server/health", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(_) => return false,
        };
        if !response.status().is_success() {
            return false;
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => body.get("status").and_then(|s| s.as_str()) == Some("ok"),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemResponse<T> {
    #[serde(default)]
    data: Option<T>,
}

/// Article row as Directus returns it, nested topic relation included.
#[derive(Debug, Default, Deserialize)]
struct RawArticle {
    id: i64,
    slug: String,
    title: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    body1: Option<String>,
    #[serde(default)]
    body2: Option<String>,
    #[serde(default)]
    source1: Option<String>,
    #[serde(default)]
    source2: Option<String>,
    #[serde(default)]
    topic: Option<RawTopicRef>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTopicRef {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl From<RawArticle> for Article {
    fn from(raw: RawArticle) -> Self {
        let topic = raw.topic.unwrap_or_default();
        Article {
            id: raw.id,
            slug: raw.slug,
            title: raw.title,
            excerpt: raw.excerpt.unwrap_or_default(),
            body1: raw.body1.unwrap_or_default(),
            body2: raw.body2.unwrap_or_default(),
            source1: raw.source1.unwrap_or_default(),
            source2: raw.source2.unwrap_or_default(),
            topic_id: topic.id,
            topic_slug: topic.slug,
            topic_title: topic.title,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawTopicRow {
    #[serde(default)]
    slug: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawCountRow {
    #[serde(default)]
    topic: Option<RawSlugRef>,
    #[serde(default)]
    count: i64,
}

#[derive(Debug, Deserialize)]
struct RawSlugRef {
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawReceipt {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    status: SubmissionStatus,
    #[serde(default)]
    created_at: Option<String>,
}

/// Put fetched articles back into the caller's id order. Ids the server
/// did not return simply stay absent.
fn restore_id_order(articles: &mut [Article], ids: &[i64]) {
    let order: HashMap<i64, usize> = ids.iter().enumerate().map(|(idx, id)| (*id, idx)).collect();
    articles.sort_by_key(|a| order.get(&a.id).copied().unwrap_or(0));
}

/// Combine topic rows with article counts into the catalog: drop the
/// synthetic `all` entry, keep counted topics the catalog collection does
/// not know, order by count then title.
fn merge_topics(rows: Vec<RawTopicRow>, counts: HashMap<String, i64>) -> Vec<TopicSummary> {
    let mut rows = rows;
    if rows.is_empty() && !counts.is_empty() {
        rows = counts
            .keys()
            .map(|slug| RawTopicRow {
                slug: slug.clone(),
                title: capitalize(slug),
            })
            .collect();
    }

    let mut merged: Vec<TopicSummary> = rows
        .into_iter()
        .filter(|row| !row.slug.is_empty() && !row.slug.eq_ignore_ascii_case("all"))
        .map(|row| {
            let count = counts.get(&row.slug).copied().unwrap_or(0);
            let title = if row.title.is_empty() {
                row.slug.clone()
            } else {
                row.title
            };
            TopicSummary {
                slug: row.slug,
                title,
                count,
            }
        })
        .collect();

    for (slug, count) in &counts {
        if !merged.iter().any(|t| &t.slug == slug) {
            merged.push(TopicSummary {
                slug: slug.clone(),
                title: capitalize(slug),
                count: *count,
            });
        }
    }

    merged.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.title.cmp(&b.title)));
    merged
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: i64) -> Article {
        Article {
            id,
            slug: format!("a-{}", id),
            title: format!("Article {}", id),
            excerpt: String::new(),
            body1: String::new(),
            body2: String::new(),
            source1: String::new(),
            source2: String::new(),
            topic_id: None,
            topic_slug: None,
            topic_title: None,
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = DirectusClient::new("http://localhost:8055/", None);
        assert_eq!(client.base_url, "http://localhost:8055");
    }

    #[test]
    fn test_raw_article_defaults() {
        let raw: RawArticle = serde_json::from_str(
            r#"{"id": 3, "slug": "s", "title": "T", "excerpt": null, "topic": null}"#,
        )
        .unwrap();
        let mapped = Article::from(raw);
        assert_eq!(mapped.excerpt, "");
        assert_eq!(mapped.topic_id, None);
        assert_eq!(mapped.topic_slug, None);
    }

    #[test]
    fn test_raw_article_nested_topic() {
        let raw: RawArticle = serde_json::from_str(
            r#"{"id": 3, "slug": "s", "title": "T",
                "topic": {"id": 9, "slug": "physics", "title": "Physics"}}"#,
        )
        .unwrap();
        let mapped = Article::from(raw);
        assert_eq!(mapped.topic_id, Some(9));
        assert_eq!(mapped.topic_label(), Some("Physics"));
    }

    #[test]
    fn test_restore_id_order() {
        let mut articles = vec![article(1), article(2), article(3)];
        restore_id_order(&mut articles, &[3, 1, 2]);
        let got: Vec<i64> = articles.iter().map(|a| a.id).collect();
        assert_eq!(got, vec![3, 1, 2]);
    }

    #[test]
    fn test_merge_topics_counts_and_sort() {
        let rows = vec![
            RawTopicRow {
                slug: "physics".into(),
                title: "Physics".into(),
            },
            RawTopicRow {
                slug: "biology".into(),
                title: "Biology".into(),
            },
            RawTopicRow {
                slug: "all".into(),
                title: "All".into(),
            },
        ];
        let mut counts = HashMap::new();
        counts.insert("biology".to_string(), 12);
        counts.insert("physics".to_string(), 4);
        counts.insert("history".to_string(), 7);

        let merged = merge_topics(rows, counts);
        let slugs: Vec<&str> = merged.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["biology", "history", "physics"]);
        assert_eq!(merged[1].title, "History");
        assert_eq!(merged[1].count, 7);
    }

    #[test]
    fn test_merge_topics_synthesizes_from_counts() {
        let mut counts = HashMap::new();
        counts.insert("space".to_string(), 3);

        let merged = merge_topics(Vec::new(), counts);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].slug, "space");
        assert_eq!(merged[0].title, "Space");
        assert_eq!(merged[0].count, 3);
    }

    #[test]
    fn test_merge_topics_tie_breaks_by_title() {
        let rows = vec![
            RawTopicRow {
                slug: "b".into(),
                title: "Beta".into(),
            },
            RawTopicRow {
                slug: "a".into(),
                title: "Alpha".into(),
            },
        ];

        let merged = merge_topics(rows, HashMap::new());
        assert_eq!(merged[0].title, "Alpha");
        assert_eq!(merged[1].title, "Beta");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("space"), "Space");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_receipt_defaults_when_body_empty() {
        let response: ItemResponse<RawReceipt> = serde_json::from_str("{}").unwrap();
        let raw = response.data.unwrap_or_default();
        assert_eq!(raw.id, 0);
        assert_eq!(raw.status, SubmissionStatus::New);
        assert!(raw.created_at.is_none());
    }
}
