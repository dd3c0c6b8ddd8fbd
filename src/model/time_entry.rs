/// A recorded time entry as read from Toggl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntry {
    pub source_id: String,
    pub description: String,
    /// Negative while the timer is still running.
    pub duration_seconds: i64,
    /// Entries logged without a project carry `None` and never pass the project filter.
    pub project_name: Option<String>,
}

/// A time entry whose description references a YouTrack issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedEntry {
    pub entry: TimeEntry,
    pub issue_id: String,
}

impl MatchedEntry {
    pub fn source_id(&self) -> &str {
        &self.entry.source_id
    }

    pub fn description(&self) -> &str {
        &self.entry.description
    }
}
