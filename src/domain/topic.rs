use serde::{Deserialize, Serialize};

/// A topic chip as the UI renders it, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub slug: String,
    pub title: String,
    /// Article count when the remote aggregate provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl Topic {
    /// The synthetic entry that clears the filter.
    pub fn all() -> Self {
        Self {
            slug: "all".into(),
            title: "All".into(),
            count: None,
        }
    }

    pub fn is_all(&self) -> bool {
        self.slug.eq_ignore_ascii_case("all")
    }
}

/// A topic row as the listing endpoint returns it, counts already merged.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSummary {
    pub slug: String,
    pub title: String,
    pub count: i64,
}

impl From<TopicSummary> for Topic {
    fn from(summary: TopicSummary) -> Self {
        Self {
            slug: summary.slug,
            title: summary.title,
            count: Some(summary.count),
        }
    }
}
