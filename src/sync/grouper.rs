use std::collections::BTreeMap;

use crate::model::time_entry::MatchedEntry;

/// Matched entries for one issue, in the order Toggl returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryGroup {
    pub issue_id: String,
    pub entries: Vec<MatchedEntry>,
}

impl EntryGroup {
    pub fn total_seconds(&self) -> i64 {
        self.entries.iter().map(|m| m.entry.duration_seconds).sum()
    }
}

/// Partition entries by issue id. Groups come out sorted by issue id; each
/// group keeps the relative input order of its entries.
pub fn group_by_issue(entries: impl IntoIterator<Item = MatchedEntry>) -> Vec<EntryGroup> {
    let mut groups: BTreeMap<String, Vec<MatchedEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.issue_id.clone()).or_default().push(entry);
    }
    groups
        .into_iter()
        .map(|(issue_id, entries)| EntryGroup { issue_id, entries })
        .collect()
}
