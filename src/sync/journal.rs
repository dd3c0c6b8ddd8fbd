use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

use crate::config::data_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    Submitted,
    SubmitFailed,
    IssueFailed,
    AuthFailed,
}

/// One line of the append-only sync journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub timestamp: String,
    pub worker: String,
    pub event: SyncEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncEvent {
    pub fn new(worker: &str, event: SyncEventKind) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            worker: worker.to_string(),
            event,
            issue_id: None,
            description: None,
            duration_minutes: None,
            message: None,
        }
    }

    pub fn issue(mut self, issue_id: &str) -> Self {
        self.issue_id = Some(issue_id.to_string());
        self
    }

    pub fn work(mut self, description: &str, duration_minutes: i64) -> Self {
        self.description = Some(description.to_string());
        self.duration_minutes = Some(duration_minutes);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Where sync events go. `Disabled` drops them.
#[derive(Debug, Clone)]
pub enum Journal {
    File(PathBuf),
    Disabled,
}

impl Journal {
    pub fn default_path() -> PathBuf {
        data_dir().join("sync-activity.jsonl")
    }

    pub fn append(&self, event: &SyncEvent) -> Result<()> {
        let Journal::File(path) = self else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Append, logging instead of failing; the journal must never stop a sync.
    pub fn record(&self, event: SyncEvent) {
        if let Err(e) = self.append(&event) {
            tracing::warn!(error = %e, "failed to write sync journal");
        }
    }
}
