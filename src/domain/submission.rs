use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 6;

/// A question waiting in the durable queue for delivery.
///
/// Field names match the JSON earlier app versions wrote under
/// `pendingSubmissions:v1`, so an upgraded install keeps its queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub topic: Option<String>,
    /// Client timestamp, milliseconds since epoch. Ordering and display
    /// only; the queue itself is ordered by position.
    pub created_at: i64,
}

impl PendingSubmission {
    /// Build a queue entry from already-validated, already-masked text.
    pub fn new(question: String, topic: Option<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: generate_id(now),
            question,
            topic,
            created_at: now,
        }
    }
}

/// Client-generated id: creation time plus a short random base36 suffix.
/// Monotonic-ish, unique for the lifetime of one device's queue.
pub fn generate_id(now_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("q_{}_{}", now_ms, suffix)
}

/// Moderation status the remote side assigns to a created submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    New,
    Approved,
    Rejected,
}

/// What the submission endpoint returns on acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: i64,
    pub status: SubmissionStatus,
    /// RFC 3339; substituted with the client clock when the server omits it.
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_shape() {
        let id = generate_id(1_700_000_000_000);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "q");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_ids_differ() {
        let a = generate_id(1);
        let b = generate_id(1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_legacy_queue_entry_parses() {
        let json = r#"{
            "id": "q_1700000000000_ab12cd",
            "question": "Why is the sky blue during the day?",
            "topic": null,
            "created_at": 1700000000000
        }"#;
        let item: PendingSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(item.topic, None);
        assert_eq!(item.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&SubmissionStatus::Approved).unwrap(),
            "\"approved\""
        );
        let s: SubmissionStatus = serde_json::from_str("\"new\"").unwrap();
        assert_eq!(s, SubmissionStatus::New);
    }
}
