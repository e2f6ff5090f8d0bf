pub mod context;
pub mod error;

pub use context::{AppContext, AskOutcome};
pub use error::{FreshetError, Result};
