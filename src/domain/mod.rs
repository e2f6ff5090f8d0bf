pub mod article;
pub mod submission;
pub mod topic;

pub use article::Article;
pub use submission::{PendingSubmission, SubmissionReceipt, SubmissionStatus};
pub use topic::{Topic, TopicSummary};
