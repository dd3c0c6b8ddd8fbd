pub mod toggl;
pub mod youtrack;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::SyncConfig;
use crate::model::time_entry::TimeEntry;
use crate::model::work_item::{PendingWorkItem, SubmitStatus, WorkItem};

/// Opaque YouTrack session returned by login. Scoped to one worker and
/// passed into every later call for that worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
pub trait TimeEntrySource: Send + Sync {
    fn name(&self) -> &str;
    /// All entries ever recorded for the account behind `api_key`.
    async fn fetch_entries(&self, api_key: &str) -> Result<Vec<TimeEntry>>;
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session>;
    async fn list_work_items(&self, session: &Session, issue_id: &str) -> Result<Vec<WorkItem>>;
    async fn create_work_item(
        &self,
        session: &Session,
        issue_id: &str,
        item: &PendingWorkItem,
        date: DateTime<Utc>,
    ) -> Result<SubmitStatus>;
}


pub fn create_providers(config: &SyncConfig) -> (Box<dyn TimeEntrySource>, Box<dyn IssueTracker>) {
    (
        Box::new(toggl::TogglProvider::new(config.source_base_url.clone())),
        Box::new(youtrack::YouTrackProvider::new(
            config.destination_base_url.clone(),
        )),
    )
}
