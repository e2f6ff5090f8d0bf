use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::api::health::{run_health_check, HealthReport};
use crate::api::{ContentApi, DirectusClient};
use crate::app::error::{FreshetError, Result};
use crate::autoflush::spawn_auto_flush;
use crate::bus::QueueBus;
use crate::config::Config;
use crate::connectivity::probe::ApiHealthProbe;
use crate::connectivity::{spawn_connectivity_monitor, ConnectivityHandle};
use crate::domain::{PendingSubmission, SubmissionReceipt};
use crate::feed::{FeedLoader, SavedLoader};
use crate::lifecycle::AppLifecycle;
use crate::queue::{QueueStore, SubmissionQueue};
use crate::readstate::ReadStateStore;
use crate::settings::SettingsStore;
use crate::storage::{KeyValueStore, SqliteKv};
use crate::topics::TopicCatalog;

/// What happened to a question handed to [`AppContext::ask`].
#[derive(Debug)]
pub enum AskOutcome {
    /// Delivered immediately; the server's receipt is attached.
    Sent(SubmissionReceipt),
    /// Parked in the durable queue for a later flush.
    Queued(PendingSubmission),
}

/// Everything wired together: storage, API client, background tasks,
/// and the per-screen loaders.
///
/// Construction hydrates persisted state and starts the connectivity
/// monitor and auto-flush tasks. The loaders start cold; call
/// `feed.reload()`, `topics.load()` etc. when the matching screen
/// mounts. [`AppContext::shutdown`] stops the background tasks
/// gracefully; dropping the context without it aborts them.
pub struct AppContext {
    pub settings: Arc<SettingsStore>,
    pub queue: Arc<SubmissionQueue>,
    pub read_state: Arc<ReadStateStore>,
    pub feed: Arc<FeedLoader>,
    pub saved: Arc<SavedLoader>,
    pub topics: Arc<TopicCatalog>,
    pub lifecycle: AppLifecycle,
    pub bus: QueueBus,
    pub connectivity: ConnectivityHandle,
    api: Arc<DirectusClient>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppContext {
    /// Open (or create) the on-disk store and wire everything up.
    pub async fn new(config: Config) -> Result<Self> {
        let db_path = match config.storage.db_path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKv::new(&db_path)?);
        Self::with_store(config, kv).await
    }

    /// Fully in-memory context with default configuration.
    pub async fn in_memory() -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKv::in_memory()?);
        Self::with_store(Config::default(), kv).await
    }

    /// Wire the context over a caller-supplied key-value store.
    pub async fn with_store(config: Config, kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        Url::parse(&config.api.base_url)?;

        let api = Arc::new(DirectusClient::with_timeout(
            &config.api.base_url,
            config.api.token.clone(),
            Duration::from_secs(config.api.timeout_secs),
        ));
        Self::with_parts(config, kv, api).await
    }

    /// Wire the context from pre-built parts.
    pub async fn with_parts(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        api: Arc<DirectusClient>,
    ) -> Result<Self> {
        let content: Arc<dyn ContentApi> = api.clone();

        let settings = Arc::new(SettingsStore::new(kv.clone()));
        settings.load().await;

        let bus = QueueBus::new();
        let queue = Arc::new(SubmissionQueue::new(
            QueueStore::new(kv.clone()),
            content.clone(),
            bus.clone(),
        ));
        queue.reload().await;

        let read_state = Arc::new(ReadStateStore::new(kv.clone()));
        read_state.load().await;

        let probe = Arc::new(ApiHealthProbe::new(content.clone()));
        let (connectivity, probe_task) = spawn_connectivity_monitor(
            probe,
            Duration::from_secs(config.connectivity.poll_interval_secs),
        );
        connectivity.set_override(settings.offline_override()).await;

        let lifecycle = AppLifecycle::new();
        let flush_task = spawn_auto_flush(
            queue.clone(),
            connectivity.clone(),
            lifecycle.subscribe(),
        );

        let feed = Arc::new(FeedLoader::with_options(
            content.clone(),
            kv.clone(),
            connectivity.clone(),
            config.feed.page_size,
            config.feed.keep_items_while_reloading,
        ));
        feed.prime_topics(settings.selected_topics());

        let saved = Arc::new(SavedLoader::new(content.clone()));
        let topics = Arc::new(TopicCatalog::new(content, kv));

        Ok(Self {
            settings,
            queue,
            read_state,
            feed,
            saved,
            topics,
            lifecycle,
            bus,
            connectivity,
            api,
            tasks: Mutex::new(vec![probe_task, flush_task]),
        })
    }

    /// Submit now when online; park in the queue when offline or when
    /// the immediate attempt fails. Validation failures never queue.
    pub async fn ask(&self, question: &str, topic: Option<&str>) -> Result<AskOutcome> {
        if self.connectivity.is_offline() {
            let pending = self
                .queue
                .enqueue(question, topic.map(str::to_string))
                .await?;
            return Ok(AskOutcome::Queued(pending));
        }

        match self.api.submit_question(question, topic).await {
            Ok(receipt) => Ok(AskOutcome::Sent(receipt)),
            Err(e @ FreshetError::Validation(_)) => Err(e),
            Err(e) => {
                debug!("Direct submission failed, queueing instead: {}", e);
                let pending = self
                    .queue
                    .enqueue(question, topic.map(str::to_string))
                    .await?;
                Ok(AskOutcome::Queued(pending))
            }
        }
    }

    /// Flip the forced-offline switch: persists the setting and tells
    /// the connectivity monitor in one go.
    pub async fn set_offline_override(&self, on: bool) {
        self.settings.set_offline_override(on).await;
        self.connectivity.set_override(on).await;
    }

    /// One-shot reachability check against the configured instance.
    pub async fn health_report(&self) -> HealthReport {
        run_health_check(&self.api).await
    }

    /// Sync the topic filter from settings into the feed loader,
    /// reloading if the selection actually changed.
    pub async fn apply_topic_selection(&self) {
        self.feed.set_topics(self.settings.selected_topics()).await;
    }

    /// Stop the background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.connectivity.shutdown().await;
        let tasks = std::mem::take(&mut *self.lock_tasks());
        for task in tasks {
            let _ = task.await;
        }
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| FreshetError::Config("Could not find data directory".into()))?;
        let freshet_dir = data_dir.join("freshet");
        std::fs::create_dir_all(&freshet_dir)?;
        Ok(freshet_dir.join("freshet.db"))
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        for task in self.lock_tasks().iter() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::MemoryKv;

    const QUESTION: &str = "Why does thunder arrive after the lightning?";

    /// Pin the context offline and wait for the monitor to apply it,
    /// so no test touches the network.
    async fn force_offline(ctx: &AppContext) {
        let mut rx = ctx.connectivity.watch();
        ctx.set_offline_override(true).await;
        while !ctx.connectivity.is_offline() {
            rx.changed().await.unwrap();
        }
    }

    async fn offline_context() -> AppContext {
        let ctx = AppContext::with_store(Config::default(), Arc::new(MemoryKv::new()))
            .await
            .unwrap();
        force_offline(&ctx).await;
        ctx
    }

    #[tokio::test]
    async fn test_in_memory_wires_up() {
        let ctx = AppContext::in_memory().await.unwrap();
        assert!(ctx.queue.pending().is_empty());
        assert!(ctx.settings.selected_topics().is_empty());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_rejected() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();

        let result = AppContext::with_store(config, Arc::new(MemoryKv::new())).await;
        assert!(matches!(result, Err(FreshetError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_offline_override_reaches_the_monitor() {
        let ctx = offline_context().await;

        assert!(ctx.connectivity.is_offline());
        assert!(ctx.settings.offline_override());

        ctx.set_offline_override(false).await;
        assert!(!ctx.settings.offline_override());
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_ask_queues_while_offline() {
        let ctx = offline_context().await;

        let outcome = ctx.ask(QUESTION, Some("physics")).await.unwrap();
        assert!(matches!(outcome, AskOutcome::Queued(_)));
        assert_eq!(ctx.queue.pending_count(), 1);
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_ask_rejects_invalid_text_without_queueing() {
        let ctx = offline_context().await;

        let result = ctx.ask("too short", None).await;
        assert!(matches!(result, Err(FreshetError::Validation(_))));
        assert_eq!(ctx.queue.pending_count(), 0);
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_rehydrates_across_contexts() {
        let kv = Arc::new(MemoryKv::new());

        let ctx = AppContext::with_store(Config::default(), kv.clone())
            .await
            .unwrap();
        force_offline(&ctx).await;
        ctx.ask(QUESTION, None).await.unwrap();
        ctx.shutdown().await;

        let revived = AppContext::with_store(Config::default(), kv).await.unwrap();
        assert_eq!(revived.queue.pending_count(), 1);
        revived.shutdown().await;
    }
}
