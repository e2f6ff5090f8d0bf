//! Reader preferences: topic selection, saved articles, appearance,
//! and the forced-offline switch.
//!
//! Everything lives in one JSON document written after every mutation.
//! A missing or unreadable document just means defaults.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::KeyValueStore;

/// Storage key for the settings document.
pub const SETTINGS_KEY: &str = "settings:v1";

pub const MIN_FONT_SIZE: u8 = 14;
pub const MAX_FONT_SIZE: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Selected topic slugs; empty means "All".
    pub selected_topics: Vec<String>,
    pub saved_ids: Vec<i64>,
    pub font_size: u8,
    pub theme: Theme,
    pub offline_override: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            selected_topics: Vec::new(),
            saved_ids: Vec::new(),
            font_size: 16,
            theme: Theme::Light,
            offline_override: false,
        }
    }
}

pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
    settings: Mutex<AppSettings>,
}

impl SettingsStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            settings: Mutex::new(AppSettings::default()),
        }
    }

    /// Hydrate from storage. Missing or malformed data keeps defaults.
    pub async fn load(&self) {
        match self.kv.get_item(SETTINGS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<AppSettings>(&raw) {
                Ok(parsed) => *self.lock_settings() = parsed,
                Err(e) => warn!("Settings malformed, using defaults: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!("Settings read failed, using defaults: {}", e),
        }
    }

    pub fn current(&self) -> AppSettings {
        self.lock_settings().clone()
    }

    pub fn selected_topics(&self) -> Vec<String> {
        self.lock_settings().selected_topics.clone()
    }

    pub fn saved_ids(&self) -> Vec<i64> {
        self.lock_settings().saved_ids.clone()
    }

    pub fn offline_override(&self) -> bool {
        self.lock_settings().offline_override
    }

    /// Toggle a topic in the multi-select. The "all" chip clears the
    /// whole selection instead of joining it.
    pub async fn toggle_topic(&self, slug: &str) {
        self.update(|s| {
            if slug == "all" {
                s.selected_topics.clear();
            } else if s.selected_topics.iter().any(|t| t == slug) {
                s.selected_topics.retain(|t| t != slug);
            } else {
                s.selected_topics.push(slug.to_string());
            }
        })
        .await;
    }

    pub async fn clear_topics(&self) {
        self.update(|s| s.selected_topics.clear()).await;
    }

    /// Replace the selection outright, deduping and dropping "all".
    pub async fn set_only_topics(&self, slugs: Vec<String>) {
        self.update(|s| {
            let mut next = Vec::new();
            for slug in slugs {
                if slug != "all" && !next.contains(&slug) {
                    next.push(slug);
                }
            }
            s.selected_topics = next;
        })
        .await;
    }

    /// Save or unsave an article; new saves land at the end.
    pub async fn toggle_saved(&self, id: i64) {
        self.update(|s| {
            if s.saved_ids.contains(&id) {
                s.saved_ids.retain(|&x| x != id);
            } else {
                s.saved_ids.push(id);
            }
        })
        .await;
    }

    pub async fn set_font_size(&self, size: u8) {
        self.update(|s| s.font_size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE))
            .await;
    }

    pub async fn set_theme(&self, theme: Theme) {
        self.update(|s| s.theme = theme).await;
    }

    pub async fn set_offline_override(&self, on: bool) {
        self.update(|s| s.offline_override = on).await;
    }

    async fn update(&self, apply: impl FnOnce(&mut AppSettings)) {
        let snapshot = {
            let mut settings = self.lock_settings();
            apply(&mut settings);
            settings.clone()
        };
        self.persist(&snapshot).await;
    }

    async fn persist(&self, snapshot: &AppSettings) {
        match serde_json::to_string(snapshot) {
            Ok(payload) => {
                if let Err(e) = self.kv.set_item(SETTINGS_KEY, &payload).await {
                    warn!("Settings write failed: {}", e);
                }
            }
            Err(e) => warn!("Settings serialize failed: {}", e),
        }
    }

    fn lock_settings(&self) -> MutexGuard<'_, AppSettings> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::{FailingKv, MemoryKv};

    fn store() -> (SettingsStore, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        (SettingsStore::new(kv.clone()), kv)
    }

    #[test]
    fn test_defaults() {
        let defaults = AppSettings::default();
        assert!(defaults.selected_topics.is_empty());
        assert!(defaults.saved_ids.is_empty());
        assert_eq!(defaults.font_size, 16);
        assert_eq!(defaults.theme, Theme::Light);
        assert!(!defaults.offline_override);
    }

    #[tokio::test]
    async fn test_toggle_topic_adds_and_removes() {
        let (store, _) = store();

        store.toggle_topic("physics").await;
        store.toggle_topic("space").await;
        assert_eq!(store.selected_topics(), vec!["physics", "space"]);

        store.toggle_topic("physics").await;
        assert_eq!(store.selected_topics(), vec!["space"]);
    }

    #[tokio::test]
    async fn test_all_chip_clears_selection() {
        let (store, _) = store();

        store.toggle_topic("physics").await;
        store.toggle_topic("space").await;
        store.toggle_topic("all").await;
        assert!(store.selected_topics().is_empty());
    }

    #[tokio::test]
    async fn test_set_only_topics_dedups_and_drops_all() {
        let (store, _) = store();

        store
            .set_only_topics(vec![
                "physics".to_string(),
                "all".to_string(),
                "physics".to_string(),
                "space".to_string(),
            ])
            .await;
        assert_eq!(store.selected_topics(), vec!["physics", "space"]);
    }

    #[tokio::test]
    async fn test_toggle_saved_appends_and_removes() {
        let (store, _) = store();

        store.toggle_saved(7).await;
        store.toggle_saved(3).await;
        assert_eq!(store.saved_ids(), vec![7, 3]);

        store.toggle_saved(7).await;
        assert_eq!(store.saved_ids(), vec![3]);
    }

    #[tokio::test]
    async fn test_font_size_clamps() {
        let (store, _) = store();

        store.set_font_size(10).await;
        assert_eq!(store.current().font_size, 14);

        store.set_font_size(30).await;
        assert_eq!(store.current().font_size, 22);

        store.set_font_size(18).await;
        assert_eq!(store.current().font_size, 18);
    }

    #[tokio::test]
    async fn test_persists_camel_case_and_reloads() {
        let (store, kv) = store();

        store.toggle_topic("physics").await;
        store.toggle_saved(42).await;
        store.set_theme(Theme::Dark).await;
        store.set_offline_override(true).await;

        let raw = kv.get_item(SETTINGS_KEY).await.unwrap().unwrap();
        assert!(raw.contains("\"selectedTopics\""));
        assert!(raw.contains("\"savedIds\""));
        assert!(raw.contains("\"offlineOverride\":true"));
        assert!(raw.contains("\"theme\":\"dark\""));

        let reloaded = SettingsStore::new(kv);
        reloaded.load().await;
        assert_eq!(reloaded.current(), store.current());
    }

    #[tokio::test]
    async fn test_partial_document_fills_defaults() {
        let kv = Arc::new(MemoryKv::new());
        kv.set_item(SETTINGS_KEY, r#"{"selectedTopics":["tech"]}"#)
            .await
            .unwrap();

        let store = SettingsStore::new(kv);
        store.load().await;

        let current = store.current();
        assert_eq!(current.selected_topics, vec!["tech"]);
        assert_eq!(current.font_size, 16);
        assert_eq!(current.theme, Theme::Light);
    }

    #[tokio::test]
    async fn test_malformed_document_keeps_defaults() {
        let kv = Arc::new(MemoryKv::new());
        kv.set_item(SETTINGS_KEY, "not json").await.unwrap();

        let store = SettingsStore::new(kv);
        store.load().await;
        assert_eq!(store.current(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_storage_faults_are_swallowed() {
        let store = SettingsStore::new(Arc::new(FailingKv));
        store.load().await;
        store.toggle_topic("physics").await;

        // The in-memory view still reflects the change
        assert_eq!(store.selected_topics(), vec!["physics"]);
    }
}
