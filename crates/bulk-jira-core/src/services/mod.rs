pub mod bulk;

pub use bulk::{BulkSubmitter, IssueOutcome, IssueState, SubmitError, SubmitReport};
