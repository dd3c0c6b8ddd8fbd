use serde::Deserialize;

use super::time_entry::MatchedEntry;

/// A work item already recorded against a YouTrack issue. Only the
/// description is read; everything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkItem {
    #[serde(default)]
    pub description: Option<String>,
}

/// A work item waiting to be submitted to YouTrack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWorkItem {
    /// `[<source_id>] <original description>`; the bracketed id is what
    /// later runs use to recognise the entry as already synced.
    pub description: String,
    pub duration_minutes: i64,
}

impl PendingWorkItem {
    pub fn from_entry(matched: &MatchedEntry) -> Self {
        Self {
            description: format!("[{}] {}", matched.source_id(), matched.description()),
            duration_minutes: matched.entry.duration_seconds / 60,
        }
    }
}

/// Result of a single create call against YouTrack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Created,
    Rejected(u16),
}

impl SubmitStatus {
    pub fn from_status_code(code: u16) -> Self {
        if code == 201 {
            SubmitStatus::Created
        } else {
            SubmitStatus::Rejected(code)
        }
    }
}
