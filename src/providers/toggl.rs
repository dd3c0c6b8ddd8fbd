use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use super::TimeEntrySource;
use crate::model::time_entry::TimeEntry;

/// Toggl has no lower bound on history; ask for everything since the epoch.
const BEGINNING_OF_TIME: &str = "1970-01-01T00:00:00";

pub struct TogglProvider {
    base_url: String,
    client: reqwest::Client,
}

impl TogglProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn auth_header(api_key: &str) -> String {
        let creds = format!("{api_key}:api_token");
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        format!("Basic {encoded}")
    }
}

#[derive(Deserialize)]
struct TimeEntriesResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct TogglEntry {
    #[serde(default)]
    id: serde_json::Value,
    description: Option<String>,
    duration: Option<i64>,
    project: Option<ProjectField>,
}

#[derive(Deserialize)]
struct ProjectField {
    name: Option<String>,
}

impl TogglEntry {
    /// `None` when the entry is malformed or lacks an id or a duration.
    fn parse(value: serde_json::Value) -> Option<TimeEntry> {
        serde_json::from_value::<TogglEntry>(value)
            .ok()?
            .into_time_entry()
    }

    fn into_time_entry(self) -> Option<TimeEntry> {
        let source_id = match self.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s,
            _ => return None,
        };
        Some(TimeEntry {
            source_id,
            description: self.description.unwrap_or_default(),
            duration_seconds: self.duration?,
            project_name: self.project.and_then(|p| p.name),
        })
    }
}

fn parse_entries(body: &str) -> Result<Vec<TimeEntry>> {
    let resp: TimeEntriesResponse =
        serde_json::from_str(body).context("Failed to parse Toggl response")?;
    let total = resp.data.len();
    let entries: Vec<TimeEntry> = resp
        .data
        .into_iter()
        .filter_map(TogglEntry::parse)
        .collect();
    if entries.len() < total {
        tracing::debug!(
            dropped = total - entries.len(),
            "dropped malformed Toggl entries or ones without id or duration"
        );
    }
    Ok(entries)
}

#[async_trait]
impl TimeEntrySource for TogglProvider {
    fn name(&self) -> &str {
        "Toggl"
    }

    async fn fetch_entries(&self, api_key: &str) -> Result<Vec<TimeEntry>> {
        let url = format!("{}time_entries.json", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[("start_date", BEGINNING_OF_TIME)])
            .header("Authorization", Self::auth_header(api_key))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Toggl API request failed")?
            .error_for_status()
            .context("Toggl rejected the time entries request")?;

        let body = resp.text().await.context("Failed to read Toggl response")?;
        parse_entries(&body)
    }
}
