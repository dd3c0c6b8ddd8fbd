use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{IssueTracker, Session};
use crate::model::work_item::{PendingWorkItem, SubmitStatus, WorkItem};

/// Legacy YouTrack REST API with cookie-based login.
pub struct YouTrackProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YouTrackProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn work_items_url(&self, issue_id: &str) -> String {
        format!(
            "{}issue/{}/timetracking/workitem/",
            self.base_url,
            urlencoding::encode(issue_id)
        )
    }
}

/// Collapse `Set-Cookie` headers into a single `Cookie` header value,
/// keeping only the `name=value` pair of each.
fn session_from_cookies<'a>(set_cookies: impl Iterator<Item = &'a str>) -> Option<Session> {
    let pairs: Vec<&str> = set_cookies
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(Session::new(pairs.join("; ")))
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn work_item_payload(item: &PendingWorkItem, date: DateTime<Utc>) -> String {
    format!(
        "<workItem><date>{}</date><duration>{}</duration><description>{}</description></workItem>",
        date.timestamp_millis(),
        item.duration_minutes,
        escape_xml(&item.description)
    )
}

fn parse_work_items(body: &str) -> Result<Vec<WorkItem>> {
    serde_json::from_str(body).context("Failed to parse YouTrack work items")
}

#[async_trait]
impl IssueTracker for YouTrackProvider {
    fn name(&self) -> &str {
        "YouTrack"
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        let resp = self
            .client
            .post(format!("{}user/login", self.base_url))
            .form(&[("login", username), ("password", password)])
            .send()
            .await
            .context("YouTrack login request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("YouTrack login returned {status}");
        }

        let cookies = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());
        session_from_cookies(cookies).context("YouTrack login returned no session cookie")
    }

    async fn list_work_items(&self, session: &Session, issue_id: &str) -> Result<Vec<WorkItem>> {
        let resp = self
            .client
            .get(self.work_items_url(issue_id))
            .header("Cookie", session.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("YouTrack work item request for {issue_id} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("YouTrack returned {status} listing work items for {issue_id}");
        }

        let body = resp
            .text()
            .await
            .context("Failed to read YouTrack response")?;
        parse_work_items(&body)
    }

    async fn create_work_item(
        &self,
        session: &Session,
        issue_id: &str,
        item: &PendingWorkItem,
        date: DateTime<Utc>,
    ) -> Result<SubmitStatus> {
        let resp = self
            .client
            .post(self.work_items_url(issue_id))
            .header("Cookie", session.as_str())
            .header("Content-Type", "application/xml")
            .body(work_item_payload(item, date))
            .send()
            .await
            .with_context(|| format!("YouTrack create work item for {issue_id} failed"))?;

        Ok(SubmitStatus::from_status_code(resp.status().as_u16()))
    }
}
