//! Durable submission queue: storage layer plus delivery loop.

pub mod flush;
pub mod store;

pub use flush::{FlushOutcome, SubmissionQueue};
pub use store::{QueueStore, QUEUE_KEY};
