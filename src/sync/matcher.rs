use anyhow::{Context, Result};
use regex::Regex;

use crate::model::time_entry::{MatchedEntry, TimeEntry};

/// Finds YouTrack issue ids such as `COT-123` in free-text descriptions.
#[derive(Debug, Clone)]
pub struct IssueMatcher {
    pattern: Regex,
}

impl IssueMatcher {
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("{}-[0-9]+", regex::escape(prefix)))
            .with_context(|| format!("Invalid issue prefix {prefix:?}"))?;
        Ok(Self { pattern })
    }

    /// When a description mentions several issues the last one wins.
    pub fn issue_id<'a>(&self, description: &'a str) -> Option<&'a str> {
        self.pattern
            .find_iter(description)
            .last()
            .map(|m| m.as_str())
    }

    pub fn tag(&self, entry: TimeEntry) -> Option<MatchedEntry> {
        let issue_id = self.issue_id(&entry.description)?.to_string();
        Some(MatchedEntry { entry, issue_id })
    }
}
