pub mod dedup;
pub mod grouper;
pub mod journal;
pub mod matcher;
pub mod orchestrator;

use thiserror::Error;

pub use orchestrator::{IssueOutcome, Orchestrator, WorkerOutcome};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YouTrack login failed for worker '{worker}': {reason}")]
    Authentication { worker: String, reason: String },

    #[error("Could not fetch Toggl entries for worker '{worker}': {reason}")]
    Source { worker: String, reason: String },
}
