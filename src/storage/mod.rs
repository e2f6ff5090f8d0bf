pub mod sqlite;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::app::Result;

pub use sqlite::SqliteKv;

/// Opaque async key-value collaborator every persisted slice sits on.
///
/// Implementations surface their own failures; the components on top
/// decide what failure means (the queue, read-state and settings stores
/// all fail open: a read error is an empty state, a write error is a
/// logged no-op).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Process-local store for tests and ephemeral contexts.
#[derive(Default)]
pub struct MemoryKv {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|e| crate::app::FreshetError::Other(format!("kv lock poisoned: {}", e)))?;
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| crate::app::FreshetError::Other(format!("kv lock poisoned: {}", e)))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| crate::app::FreshetError::Other(format!("kv lock poisoned: {}", e)))?;
        items.remove(key);
        Ok(())
    }
}

/// Store whose every operation fails; exercises the fail-open paths.
#[cfg(test)]
pub(crate) struct FailingKv;

#[cfg(test)]
#[async_trait]
impl KeyValueStore for FailingKv {
    async fn get_item(&self, _key: &str) -> Result<Option<String>> {
        Err(crate::app::FreshetError::Other("kv store unavailable".into()))
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        Err(crate::app::FreshetError::Other("kv store unavailable".into()))
    }

    async fn remove_item(&self, _key: &str) -> Result<()> {
        Err(crate::app::FreshetError::Other("kv store unavailable".into()))
    }
}
