use anyhow::Result;
use tracing::Instrument;

use super::dedup::already_entered;
use super::grouper::{group_by_issue, EntryGroup};
use super::journal::{Journal, SyncEvent, SyncEventKind};
use super::matcher::IssueMatcher;
use super::SyncError;
use crate::config::{SyncConfig, WorkerCredential};
use crate::model::time_entry::{MatchedEntry, TimeEntry};
use crate::model::work_item::{PendingWorkItem, SubmitStatus};
use crate::providers::{IssueTracker, Session, TimeEntrySource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    Synced,
    /// Existing work items could not be read; nothing was submitted.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReport {
    pub issue_id: String,
    pub outcome: IssueOutcome,
    pub already_present: usize,
    pub created: usize,
    pub failed: usize,
    pub created_minutes: i64,
}

impl IssueReport {
    fn new(issue_id: &str) -> Self {
        Self {
            issue_id: issue_id.to_string(),
            outcome: IssueOutcome::Synced,
            already_present: 0,
            created: 0,
            failed: 0,
            created_minutes: 0,
        }
    }
}

#[derive(Debug)]
pub enum WorkerOutcome {
    Done,
    /// At least one issue group was abandoned.
    DoneWithSkips,
    Failed(SyncError),
}

#[derive(Debug)]
pub struct WorkerReport {
    pub label: String,
    pub outcome: WorkerOutcome,
    pub issues: Vec<IssueReport>,
}

impl WorkerReport {
    pub fn created(&self) -> usize {
        self.issues.iter().map(|i| i.created).sum()
    }

    pub fn already_present(&self) -> usize {
        self.issues.iter().map(|i| i.already_present).sum()
    }

    pub fn failed(&self) -> usize {
        self.issues.iter().map(|i| i.failed).sum()
    }
}

/// Drives Toggl -> YouTrack reconciliation for every configured worker.
pub struct Orchestrator {
    config: SyncConfig,
    matcher: IssueMatcher,
    source: Box<dyn TimeEntrySource>,
    tracker: Box<dyn IssueTracker>,
    journal: Journal,
}

impl Orchestrator {
    pub fn new(
        config: SyncConfig,
        source: Box<dyn TimeEntrySource>,
        tracker: Box<dyn IssueTracker>,
        journal: Journal,
    ) -> Result<Self> {
        let matcher = IssueMatcher::new(&config.issue_prefix)?;
        Ok(Self {
            config,
            matcher,
            source,
            tracker,
            journal,
        })
    }

    /// Run every worker in configuration order. A failing worker never stops
    /// the ones after it.
    pub async fn run(&self) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(self.config.workers.len());
        for worker in &self.config.workers {
            let span = tracing::info_span!("worker", worker = %worker.label);
            reports.push(self.run_worker(worker).instrument(span).await);
        }
        reports
    }

    pub async fn run_worker(&self, worker: &WorkerCredential) -> WorkerReport {
        let mut report = WorkerReport {
            label: worker.label.clone(),
            outcome: WorkerOutcome::Done,
            issues: Vec::new(),
        };

        let entries = match self.source.fetch_entries(&worker.source_api_key).await {
            Ok(entries) => entries,
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::error!(
                    worker = %worker.label,
                    source = self.source.name(),
                    error = %reason,
                    "failed to fetch time entries"
                );
                report.outcome = WorkerOutcome::Failed(SyncError::Source {
                    worker: worker.label.clone(),
                    reason,
                });
                return report;
            }
        };

        let fetched = entries.len();
        let groups = group_by_issue(self.select_entries(entries));
        tracing::info!(fetched, issues = groups.len(), "selected time entries");

        let session = match self
            .tracker
            .authenticate(&worker.destination_username, &worker.destination_password)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::error!(
                    worker = %worker.label,
                    tracker = self.tracker.name(),
                    error = %reason,
                    "authentication failed"
                );
                self.journal.record(
                    SyncEvent::new(&worker.label, SyncEventKind::AuthFailed).message(&reason),
                );
                report.outcome = WorkerOutcome::Failed(SyncError::Authentication {
                    worker: worker.label.clone(),
                    reason,
                });
                return report;
            }
        };

        for group in &groups {
            let issue = self.sync_issue(worker, &session, group).await;
            if matches!(issue.outcome, IssueOutcome::Failed(_)) {
                report.outcome = WorkerOutcome::DoneWithSkips;
            }
            report.issues.push(issue);
        }

        tracing::info!(
            created = report.created(),
            already_present = report.already_present(),
            failed = report.failed(),
            "worker finished"
        );
        report
    }

    /// Keep entries in an approved project, with a stopped timer, whose
    /// description names an issue.
    pub fn select_entries(&self, entries: Vec<TimeEntry>) -> Vec<MatchedEntry> {
        entries
            .into_iter()
            .filter(|e| {
                e.project_name
                    .as_deref()
                    .is_some_and(|p| self.config.is_approved_project(p))
            })
            .filter(|e| e.duration_seconds > 0)
            .filter_map(|e| self.matcher.tag(e))
            .collect()
    }

    async fn sync_issue(
        &self,
        worker: &WorkerCredential,
        session: &Session,
        group: &EntryGroup,
    ) -> IssueReport {
        let mut report = IssueReport::new(&group.issue_id);

        // Snapshot once per group; items created below are not re-read.
        let existing: Vec<String> = match self
            .tracker
            .list_work_items(session, &group.issue_id)
            .await
        {
            Ok(items) => items.into_iter().filter_map(|i| i.description).collect(),
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::warn!(
                    worker = %worker.label,
                    issue_id = %group.issue_id,
                    error = %reason,
                    "skipping issue, could not read work items"
                );
                self.journal.record(
                    SyncEvent::new(&worker.label, SyncEventKind::IssueFailed)
                        .issue(&group.issue_id)
                        .message(&reason),
                );
                report.outcome = IssueOutcome::Failed(reason);
                return report;
            }
        };

        let pending: Vec<PendingWorkItem> = group
            .entries
            .iter()
            .filter(|m| {
                let present = already_entered(m, &existing);
                if present {
                    report.already_present += 1;
                }
                !present
            })
            .map(PendingWorkItem::from_entry)
            .collect();

        for item in &pending {
            self.submit(worker, session, &group.issue_id, item, &mut report)
                .await;
        }

        if report.created > 0 {
            tracing::info!(
                issue_id = %group.issue_id,
                created = report.created,
                minutes = report.created_minutes,
                "recorded work"
            );
        } else {
            tracing::debug!(
                issue_id = %group.issue_id,
                already_present = report.already_present,
                tracked_minutes = group.total_seconds() / 60,
                "nothing new"
            );
        }
        report
    }

    async fn submit(
        &self,
        worker: &WorkerCredential,
        session: &Session,
        issue_id: &str,
        item: &PendingWorkItem,
        report: &mut IssueReport,
    ) {
        let result = self
            .tracker
            .create_work_item(session, issue_id, item, chrono::Utc::now())
            .await;

        let failure = match result {
            Ok(SubmitStatus::Created) => None,
            Ok(SubmitStatus::Rejected(code)) => Some(format!("status {code}")),
            Err(e) => Some(format!("{e:#}")),
        };

        let event = match failure {
            None => {
                report.created += 1;
                report.created_minutes += item.duration_minutes;
                tracing::debug!(
                    issue_id,
                    description = %item.description,
                    minutes = item.duration_minutes,
                    "created work item"
                );
                SyncEvent::new(&worker.label, SyncEventKind::Submitted)
            }
            Some(reason) => {
                report.failed += 1;
                tracing::warn!(
                    worker = %worker.label,
                    issue_id,
                    description = %item.description,
                    minutes = item.duration_minutes,
                    error = %reason,
                    "failed to create work item"
                );
                SyncEvent::new(&worker.label, SyncEventKind::SubmitFailed).message(reason)
            }
        };
        self.journal.record(
            event
                .issue(issue_id)
                .work(&item.description, item.duration_minutes),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::{entry, MockSource, MockTracker, Submission};

    fn worker(label: &str) -> WorkerCredential {
        WorkerCredential {
            label: label.into(),
            source_api_key: format!("{label}-key"),
            destination_username: label.into(),
            destination_password: "secret".into(),
        }
    }

    fn config(workers: Vec<WorkerCredential>) -> SyncConfig {
        SyncConfig {
            source_base_url: "https://toggl.example/api/v6/".into(),
            destination_base_url: "https://yt.example/rest/".into(),
            approved_project_names: vec!["Cotton On".into(), "BAU ANZ".into()],
            issue_prefix: "COT".into(),
            journal: false,
            workers,
        }
    }

    fn orchestrator(
        workers: Vec<WorkerCredential>,
        source: MockSource,
        tracker: MockTracker,
    ) -> Orchestrator {
        Orchestrator::new(
            config(workers),
            Box::new(source),
            Box::new(tracker),
            Journal::Disabled,
        )
        .unwrap()
    }

    fn scenario_entries() -> Vec<TimeEntry> {
        vec![
            entry("1", "COT-5 design", 3600, Some("Cotton On")),
            entry("2", "COT-5 review", 1800, Some("Cotton On")),
            entry("3", "unrelated", 600, Some("Cotton On")),
        ]
    }

    fn submitted(subs: &[Submission]) -> Vec<(&str, &str, i64)> {
        subs.iter()
            .map(|s| (s.issue_id.as_str(), s.description.as_str(), s.duration_minutes))
            .collect()
    }

    #[tokio::test]
    async fn end_to_end_submits_matched_entries_in_order() {
        let tracker = MockTracker::new().with_user("alice", "secret");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries("alice-key", scenario_entries()),
            tracker,
        );

        let reports = orch.run().await;

        assert_eq!(
            submitted(&subs.lock().unwrap()),
            vec![
                ("COT-5", "[1] COT-5 design", 60),
                ("COT-5", "[2] COT-5 review", 30),
            ]
        );
        assert!(matches!(reports[0].outcome, WorkerOutcome::Done));
        assert_eq!(reports[0].issues.len(), 1);
        assert_eq!(reports[0].issues[0].created_minutes, 90);
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let tracker = MockTracker::new().with_user("alice", "secret");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries("alice-key", scenario_entries()),
            tracker,
        );

        let first = orch.run().await;
        let second = orch.run().await;

        assert_eq!(first[0].created(), 2);
        assert_eq!(second[0].created(), 0);
        assert_eq!(second[0].already_present(), 2);
        assert_eq!(subs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn existing_fingerprints_are_skipped_exactly() {
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_existing("COT-1", &[Some("[1234] did work"), None, Some("[123] did work")]);
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries(
                "alice-key",
                vec![
                    entry("123", "COT-1 one", 120, Some("Cotton On")),
                    entry("12", "COT-1 two", 125, Some("Cotton On")),
                ],
            ),
            tracker,
        );

        let reports = orch.run().await;

        assert_eq!(
            submitted(&subs.lock().unwrap()),
            vec![("COT-1", "[12] COT-1 two", 2)]
        );
        assert_eq!(reports[0].issues[0].already_present, 1);
    }

    #[test]
    fn running_and_unapproved_entries_are_excluded() {
        let orch = orchestrator(vec![], MockSource::new(), MockTracker::new());
        let selected = orch.select_entries(vec![
            entry("1", "COT-1 running", -1500, Some("Cotton On")),
            entry("2", "COT-2 zero", 0, Some("Cotton On")),
            entry("3", "COT-3 lowercase project", 60, Some("cotton on")),
            entry("4", "COT-4 other", 60, Some("Internal")),
            entry("5", "COT-5 no project", 60, None),
            entry("6", "no ticket reference", 60, Some("BAU ANZ")),
        ]);
        let ids: Vec<&str> = selected.iter().map(|m| m.source_id()).collect();
        assert_eq!(ids, vec!["3"]);
        assert_eq!(selected[0].issue_id, "COT-3");
    }

    #[tokio::test]
    async fn failed_issue_read_does_not_stop_other_groups() {
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_failing_read("COT-1");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries(
                "alice-key",
                vec![
                    entry("1", "COT-1 broken", 600, Some("Cotton On")),
                    entry("2", "COT-2 fine", 600, Some("Cotton On")),
                ],
            ),
            tracker,
        );

        let reports = orch.run().await;

        assert_eq!(
            submitted(&subs.lock().unwrap()),
            vec![("COT-2", "[2] COT-2 fine", 10)]
        );
        assert!(matches!(reports[0].outcome, WorkerOutcome::DoneWithSkips));
        assert!(matches!(
            reports[0].issues[0].outcome,
            IssueOutcome::Failed(_)
        ));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn failure_logs_carry_worker_label_without_span() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_env_filter("warn")
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_failing_read("COT-1")
            .with_rejected("[2] COT-2 fine");
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries(
                "alice-key",
                vec![
                    entry("1", "COT-1 broken", 600, Some("Cotton On")),
                    entry("2", "COT-2 fine", 600, Some("Cotton On")),
                ],
            ),
            tracker,
        );

        orch.run().await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.contains("worker=alice")));
        assert!(lines[0].contains("COT-1"));
        assert!(lines[1].contains("[2] COT-2 fine"));
    }

    #[tokio::test]
    async fn rejected_submission_does_not_stop_group() {
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_rejected("[1] COT-5 design");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries("alice-key", scenario_entries()),
            tracker,
        );

        let reports = orch.run().await;

        assert_eq!(
            submitted(&subs.lock().unwrap()),
            vec![("COT-5", "[2] COT-5 review", 30)]
        );
        let issue = &reports[0].issues[0];
        assert_eq!((issue.created, issue.failed), (1, 1));
        assert!(matches!(reports[0].outcome, WorkerOutcome::Done));
    }

    #[tokio::test]
    async fn transport_error_does_not_stop_group() {
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_transport_error("[1] COT-5 design");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries("alice-key", scenario_entries()),
            tracker,
        );

        let reports = orch.run().await;

        assert_eq!(
            submitted(&subs.lock().unwrap()),
            vec![("COT-5", "[2] COT-5 review", 30)]
        );
        let issue = &reports[0].issues[0];
        assert_eq!((issue.created, issue.failed), (1, 1));
        assert_eq!(issue.outcome, IssueOutcome::Synced);
        assert!(matches!(reports[0].outcome, WorkerOutcome::Done));
    }

    #[tokio::test]
    async fn unwritable_journal_does_not_stop_sync() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_rejected("[2] COT-5 review");
        let subs = tracker.submissions();
        let orch = Orchestrator::new(
            config(vec![worker("alice")]),
            Box::new(MockSource::new().with_entries("alice-key", scenario_entries())),
            Box::new(tracker),
            Journal::File(blocker.join("sync-activity.jsonl")),
        )
        .unwrap();

        let reports = orch.run().await;

        assert_eq!(
            submitted(&subs.lock().unwrap()),
            vec![("COT-5", "[1] COT-5 design", 60)]
        );
        assert_eq!((reports[0].created(), reports[0].failed()), (1, 1));
        assert!(matches!(reports[0].outcome, WorkerOutcome::Done));
    }

    #[tokio::test]
    async fn auth_failure_stops_only_that_worker() {
        let mut bad = worker("bob");
        bad.destination_password = "wrong".into();
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_user("bob", "secret");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![bad, worker("alice")],
            MockSource::new()
                .with_entries("bob-key", vec![entry("9", "COT-9 bob", 600, Some("Cotton On"))])
                .with_entries("alice-key", scenario_entries()),
            tracker,
        );

        let reports = orch.run().await;

        assert_eq!(reports.len(), 2);
        assert!(matches!(
            reports[0].outcome,
            WorkerOutcome::Failed(SyncError::Authentication { .. })
        ));
        assert!(reports[0].issues.is_empty());
        assert!(matches!(reports[1].outcome, WorkerOutcome::Done));
        assert!(subs
            .lock()
            .unwrap()
            .iter()
            .all(|s| s.session == "session-alice"));
        assert_eq!(subs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn source_failure_stops_only_that_worker() {
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_user("bob", "secret");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("bob"), worker("alice")],
            MockSource::new()
                .with_failure("bob-key")
                .with_entries("alice-key", scenario_entries()),
            tracker,
        );

        let reports = orch.run().await;

        assert!(matches!(
            reports[0].outcome,
            WorkerOutcome::Failed(SyncError::Source { .. })
        ));
        assert_eq!(subs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn each_worker_uses_its_own_session() {
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_user("bob", "secret");
        let calls = tracker.list_calls();
        let orch = orchestrator(
            vec![worker("alice"), worker("bob")],
            MockSource::new()
                .with_entries("alice-key", vec![entry("1", "COT-1 a", 60, Some("Cotton On"))])
                .with_entries("bob-key", vec![entry("2", "COT-2 b", 60, Some("BAU ANZ"))]),
            tracker,
        );

        orch.run().await;

        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &["session-alice:COT-1", "session-bob:COT-2"]
        );
    }

    #[tokio::test]
    async fn snapshot_is_not_refreshed_within_a_group() {
        let tracker = MockTracker::new().with_user("alice", "secret");
        let subs = tracker.submissions();
        let orch = orchestrator(
            vec![worker("alice")],
            MockSource::new().with_entries(
                "alice-key",
                vec![
                    entry("1", "COT-1 once", 60, Some("Cotton On")),
                    entry("1", "COT-1 once", 60, Some("Cotton On")),
                ],
            ),
            tracker,
        );

        orch.run().await;

        assert_eq!(subs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn journal_records_submissions_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync-activity.jsonl");
        let tracker = MockTracker::new()
            .with_user("alice", "secret")
            .with_rejected("[2] COT-5 review");
        let orch = Orchestrator::new(
            config(vec![worker("alice")]),
            Box::new(MockSource::new().with_entries("alice-key", scenario_entries())),
            Box::new(tracker),
            Journal::File(path.clone()),
        )
        .unwrap();

        orch.run().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let events: Vec<SyncEvent> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let kinds: Vec<SyncEventKind> = events.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![SyncEventKind::Submitted, SyncEventKind::SubmitFailed]
        );
        assert_eq!(events[1].description.as_deref(), Some("[2] COT-5 review"));
        assert_eq!(events[1].duration_minutes, Some(30));
        assert_eq!(events[1].worker, "alice");
    }
}
