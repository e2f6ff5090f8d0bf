//! # Freshet
//!
//! Offline-first sync core for a question-and-answer card reader backed
//! by a Directus CMS.
//!
//! ## Architecture
//!
//! ```text
//! ConnectivityMonitor ──┐
//! AppLifecycle ─────────┼→ auto-flush → SubmissionQueue → DirectusClient
//!                       │                    │
//!                  FeedLoader ←─ cache ─ KeyValueStore ─→ ReadStateStore
//! ```
//!
//! Questions a reader asks while offline land in a durable queue and
//! are delivered, oldest first, when the network returns or the app
//! comes back to the foreground. The feed reads through a page-1 cache
//! so the last content stays readable without a connection.
//!
//! ## Quick Start
//!
//! ```no_run
//! use freshet::app::AppContext;
//! use freshet::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let ctx = AppContext::new(Config::load()?).await?;
//!
//!     ctx.topics.load().await;
//!     ctx.feed.reload().await;
//!     for article in ctx.feed.snapshot().items {
//!         println!("{}", article.title);
//!     }
//!
//!     match ctx.ask("Why is the sky blue during the day?", Some("physics")).await? {
//!         freshet::app::AskOutcome::Sent(receipt) => println!("sent: {}", receipt.id),
//!         freshet::app::AskOutcome::Queued(_) => println!("queued for later"),
//!     }
//!
//!     ctx.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) wires together storage, the Directus
/// client, the connectivity monitor and the background flush task.
pub mod app;

/// Remote API surface.
///
/// - [`ContentApi`](api::ContentApi): async trait the loaders and queue depend on
/// - [`DirectusClient`](api::DirectusClient): reqwest-based implementation
pub mod api;

/// Auto-flush trigger: drains the submission queue on reconnect and
/// on app foreground.
pub mod autoflush;

/// In-process notification bus for queue-change fan-out.
pub mod bus;

/// Configuration management.
///
/// Loads from `~/.config/freshet/config.toml`; a commented default file
/// is written on first run.
pub mod config;

/// Connectivity monitoring with offline-fast/online-settled debounce
/// and a manual offline override.
pub mod connectivity;

/// Core domain models.
///
/// - [`Article`](domain::Article): one Q/A card
/// - [`PendingSubmission`](domain::PendingSubmission): a queued question
/// - [`Topic`](domain::Topic) / [`TopicSummary`](domain::TopicSummary)
pub mod domain;

/// Feed loading: pagination, the offline page-1 cache, and
/// stale-response fencing. [`SavedLoader`](feed::SavedLoader) covers
/// saved articles.
pub mod feed;

/// App foreground/background phase publisher.
pub mod lifecycle;

/// Question validation and profanity masking.
pub mod moderation;

/// The durable submission queue and its flush engine.
///
/// - [`QueueStore`](queue::QueueStore): persisted FIFO list
/// - [`SubmissionQueue`](queue::SubmissionQueue): enqueue + at-most-one-flush delivery
pub mod queue;

/// Per-topic read-article tracking with debounced persistence.
pub mod readstate;

/// Reader preferences persisted as one JSON document.
pub mod settings;

/// Key-value persistence.
///
/// - [`KeyValueStore`](storage::KeyValueStore): async trait everything persists through
/// - [`SqliteKv`](storage::SqliteKv): SQLite implementation
/// - [`MemoryKv`](storage::MemoryKv): in-memory implementation
pub mod storage;

/// Topic catalog with cache-then-network loading.
pub mod topics;
