use serde::{Deserialize, Serialize};

/// One question/answer card as the UI consumes it.
///
/// Optional text fields from the remote side are normalized to empty
/// strings at the mapping boundary; only the topic relation stays
/// optional. Serialized with camelCase names because the feed cache
/// written by earlier app versions uses them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body1: String,
    #[serde(default)]
    pub body2: String,
    #[serde(default)]
    pub source1: String,
    #[serde(default)]
    pub source2: String,
    #[serde(default)]
    pub topic_id: Option<i64>,
    #[serde(default)]
    pub topic_slug: Option<String>,
    #[serde(default)]
    pub topic_title: Option<String>,
}

impl Article {
    /// Topic label for display, falling back to the slug.
    pub fn topic_label(&self) -> Option<&str> {
        self.topic_title
            .as_deref()
            .or(self.topic_slug.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_shape_round_trip() {
        let json = r#"{
            "id": 7,
            "slug": "why-sky-blue",
            "title": "Why is the sky blue?",
            "excerpt": "Scattering",
            "body1": "Rayleigh scattering...",
            "body2": "",
            "source1": "",
            "source2": "",
            "topicId": 2,
            "topicSlug": "physics",
            "topicTitle": "Physics"
        }"#;

        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.id, 7);
        assert_eq!(article.topic_slug.as_deref(), Some("physics"));

        let out = serde_json::to_value(&article).unwrap();
        assert_eq!(out["topicId"], 2);
        assert!(out.get("topic_id").is_none());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"id": 1, "slug": "s", "title": "t"}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.excerpt, "");
        assert_eq!(article.topic_id, None);
        assert_eq!(article.topic_label(), None);
    }

    #[test]
    fn test_topic_label_prefers_title() {
        let json = r#"{"id": 1, "slug": "s", "title": "t",
                       "topicSlug": "physics", "topicTitle": "Physics"}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.topic_label(), Some("Physics"));
    }
}
