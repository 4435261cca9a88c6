//! Applies a folder of monitor definitions to a Kener instance.
//!
//! Files are processed in filename order and monitors in list order, one
//! at a time. For each monitor the driver validates the record, rejects a
//! tag already seen in this run, skips tags that already exist remotely,
//! resolves group children, fills defaults and finally creates it.
//!
//! Only a bad definitions folder aborts a run. Every other failure is
//! confined to the monitor it happened on.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::client::MonitorApi;
use crate::defaults::apply_defaults;
use crate::definitions::{self, DefinitionError};
use crate::group::resolve_group;
use crate::model::Monitor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    AlreadyExists,
    Duplicate,
    Invalid(String),
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::Duplicate => write!(f, "duplicate tag"),
            Self::Invalid(reason) => write!(f, "invalid: {reason}"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub file: PathBuf,
    pub tag: Option<String>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub files: Vec<PathBuf>,
    pub monitors: Vec<MonitorReport>,
}

impl ApplyReport {
    pub fn count(&self, matches: impl Fn(&Outcome) -> bool) -> usize {
        self.monitors.iter().filter(|m| matches(&m.outcome)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|o| *o == Outcome::Created)
    }

    pub fn already_existing(&self) -> usize {
        self.count(|o| *o == Outcome::AlreadyExists)
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| *o == Outcome::Duplicate)
    }

    pub fn invalid(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Invalid(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// Tags submitted successfully, in submission order.
    pub fn created_tags(&self) -> Vec<&str> {
        self.monitors
            .iter()
            .filter(|m| m.outcome == Outcome::Created)
            .filter_map(|m| m.tag.as_deref())
            .collect()
    }
}

pub struct Reconciler {
    api: Arc<dyn MonitorApi>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn MonitorApi>) -> Self {
        Self { api }
    }

    pub async fn run(&self, folder: &Path) -> Result<ApplyReport, DefinitionError> {
        let files = definitions::discover(folder)?;
        let mut report = ApplyReport::default();
        let mut seen = HashSet::new();

        for file in files {
            info!(file = %file.display(), "Processing definition file");
            for record in definitions::load_records(&file) {
                let (tag, outcome) = self.apply_record(&record, &mut seen).await;
                report.monitors.push(MonitorReport {
                    file: file.clone(),
                    tag,
                    outcome,
                });
            }
            report.files.push(file);
        }

        info!(
            files = report.files.len(),
            created = report.created(),
            existing = report.already_existing(),
            duplicates = report.duplicates(),
            invalid = report.invalid(),
            failed = report.failed(),
            "Apply finished"
        );
        Ok(report)
    }

    async fn apply_record(
        &self,
        record: &Value,
        seen: &mut HashSet<String>,
    ) -> (Option<String>, Outcome) {
        let raw_tag = record
            .get("tag")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut monitor = match Monitor::from_definition(record).and_then(|m| m.validate().map(|()| m)) {
            Ok(m) => m,
            Err(e) => {
                error!(tag = ?raw_tag, error = %e, "Invalid monitor definition, skipping");
                return (raw_tag, Outcome::Invalid(e.to_string()));
            }
        };
        let tag = monitor.tag.clone();

        if !seen.insert(tag.clone()) {
            warn!(tag = %tag, name = %monitor.name, "Duplicate tag in definitions, skipping");
            return (Some(tag), Outcome::Duplicate);
        }

        if self.api.monitor_exists(&tag).await {
            info!(tag = %tag, name = %monitor.name, "Monitor already exists, skipping creation");
            return (Some(tag), Outcome::AlreadyExists);
        }

        if monitor.is_group() {
            resolve_group(&mut monitor, self.api.as_ref()).await;
        }
        apply_defaults(&mut monitor);

        match self.api.create_monitor(&monitor).await {
            Ok(()) => (Some(tag), Outcome::Created),
            Err(e) => {
                error!(tag = %tag, name = %monitor.name, error = %e, "Failed to create monitor");
                (Some(tag), Outcome::Failed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    use crate::client::ApiError;
    use crate::model::GroupChild;

    /// In-memory server: created monitors become visible to later queries.
    #[derive(Default)]
    struct FakeApi {
        remote: Mutex<Vec<Value>>,
        rejected: Vec<String>,
        unreachable: bool,
        query_fails: bool,
        created: Mutex<Vec<Monitor>>,
    }

    impl FakeApi {
        fn with_remote(tags: &[&str]) -> Self {
            let remote = tags
                .iter()
                .enumerate()
                .map(|(i, t)| json!({"id": 100 + i as i64, "tag": t, "name": t, "monitor_type": "API"}))
                .collect();
            Self {
                remote: Mutex::new(remote),
                ..Self::default()
            }
        }

        fn created_tags(&self) -> Vec<String> {
            self.created
                .lock()
                .unwrap()
                .iter()
                .map(|m| m.tag.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MonitorApi for FakeApi {
        async fn query_monitors(&self, tag: Option<&str>) -> Result<Vec<Value>, ApiError> {
            if self.unreachable || self.query_fails {
                return Err(ApiError::Network {
                    path: "/api/monitor".into(),
                    reason: "connection refused".into(),
                });
            }
            let remote = self.remote.lock().unwrap();
            Ok(remote
                .iter()
                .filter(|m| tag.map_or(true, |t| m["tag"] == t))
                .cloned()
                .collect())
        }

        async fn create_monitor(&self, monitor: &Monitor) -> Result<(), ApiError> {
            if self.unreachable || self.rejected.contains(&monitor.tag) {
                return Err(ApiError::Http {
                    path: "/api/monitor".into(),
                    status: 400,
                    body: "rejected".into(),
                });
            }
            let mut remote = self.remote.lock().unwrap();
            let mut payload = monitor.to_payload().unwrap();
            payload["id"] = json!(remote.len() as i64 + 1);
            remote.push(payload);
            self.created.lock().unwrap().push(monitor.clone());
            Ok(())
        }
    }

    fn folder(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    const CORE: &str = "\
monitors:
  - tag: web
    name: Website
    monitor_type: API
  - tag: db
    name: Database
    monitor_type: SQL
  - tag: dns
    name: DNS
    monitor_type: DNS
";

    #[tokio::test]
    async fn creates_monitors_in_file_then_list_order() {
        let dir = folder(&[
            ("02-extra.yml", "monitors:\n  - {tag: ping, name: Ping, monitor_type: PING}\n"),
            ("01-core.yml", CORE),
            ("extra.yaml", "monitors:\n  - {tag: ignored, name: I, monitor_type: PING}\n"),
        ]);
        let api = Arc::new(FakeApi::default());
        let report = Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(api.created_tags(), vec!["web", "db", "dns", "ping"]);
        assert_eq!(report.created_tags(), vec!["web", "db", "dns", "ping"]);
    }

    #[tokio::test]
    async fn second_run_creates_nothing() {
        let dir = folder(&[("01-core.yml", CORE)]);
        let api = Arc::new(FakeApi::default());
        let reconciler = Reconciler::new(api.clone());

        let first = reconciler.run(dir.path()).await.unwrap();
        let second = reconciler.run(dir.path()).await.unwrap();

        assert_eq!(first.created(), 3);
        assert_eq!(second.created(), 0);
        assert_eq!(second.already_existing(), 3);
        assert_eq!(api.remote.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn only_first_occurrence_of_a_tag_is_submitted() {
        let dir = folder(&[
            ("01-a.yml", "monitors:\n  - {tag: web, name: First, monitor_type: API}\n  - {tag: web, name: Second, monitor_type: API}\n"),
            ("02-b.yml", "monitors:\n  - {tag: web, name: Third, monitor_type: PING}\n"),
        ]);
        let api = Arc::new(FakeApi::default());
        let report = Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        let created = api.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "First");
        assert_eq!(report.duplicates(), 2);
    }

    #[tokio::test]
    async fn duplicate_of_existing_remote_tag_is_still_a_duplicate() {
        let dir = folder(&[(
            "01-a.yml",
            "monitors:\n  - {tag: web, name: A, monitor_type: API}\n  - {tag: web, name: B, monitor_type: API}\n",
        )]);
        let api = Arc::new(FakeApi::with_remote(&["web"]));
        let report = Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        assert_eq!(report.already_existing(), 1);
        assert_eq!(report.duplicates(), 1);
        assert!(api.created_tags().is_empty());
    }

    #[tokio::test]
    async fn failed_creation_does_not_stop_the_batch() {
        let dir = folder(&[("01-core.yml", CORE)]);
        let api = Arc::new(FakeApi {
            rejected: vec!["db".into()],
            ..FakeApi::default()
        });
        let report = Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        assert_eq!(api.created_tags(), vec!["web", "dns"]);
        assert_eq!(report.failed(), 1);
        assert!(matches!(report.monitors[1].outcome, Outcome::Failed(_)));
    }

    #[tokio::test]
    async fn invalid_records_are_skipped() {
        let dir = folder(&[(
            "01-mixed.yml",
            "\
monitors:
  - {name: No tag, monitor_type: API}
  - {tag: '', name: Empty tag, monitor_type: API}
  - {tag: bad-type, name: Bad, monitor_type: HTTP}
  - {tag: no-name, monitor_type: API}
  - just a string
  - {tag: good, name: Good, monitor_type: TCP}
",
        )]);
        let api = Arc::new(FakeApi::default());
        let report = Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        assert_eq!(report.invalid(), 5);
        assert_eq!(api.created_tags(), vec!["good"]);
        assert_eq!(report.monitors[2].tag.as_deref(), Some("bad-type"));
    }

    #[tokio::test]
    async fn groups_resolve_children_created_earlier_in_the_run() {
        let dir = folder(&[
            ("01-core.yml", CORE),
            (
                "02-groups.yml",
                "\
monitors:
  - tag: backend
    name: Backend
    monitor_type: GROUP
    type_data:
      monitors:
        - tag: web
        - tag: missing
        - tag: db
",
            ),
        ]);
        let api = Arc::new(FakeApi::default());
        Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        let created = api.created.lock().unwrap();
        let group = created.iter().find(|m| m.tag == "backend").unwrap();
        let children: Vec<_> = group
            .type_data
            .as_group()
            .unwrap()
            .monitors
            .iter()
            .map(|c| match c {
                GroupChild::Resolved { id, tag, selected, .. } => (*id, tag.clone(), *selected),
                other => panic!("unresolved child {other:?}"),
            })
            .collect();
        assert_eq!(children, vec![(1, "web".to_string(), true), (2, "db".to_string(), true)]);
        assert_eq!(group.cron.as_deref(), Some("* * * * *"));
    }

    #[tokio::test]
    async fn created_monitors_carry_defaults() {
        let dir = folder(&[(
            "01-a.yml",
            "monitors:\n  - {tag: web, name: Web, monitor_type: API, cron: '*/2 * * * *'}\n",
        )]);
        let api = Arc::new(FakeApi::default());
        Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        let created = api.created.lock().unwrap();
        assert_eq!(created[0].cron.as_deref(), Some("*/2 * * * *"));
        assert_eq!(created[0].day_down_minimum_count, Some(1));
        assert!(created[0].created_at.is_some());
    }

    #[tokio::test]
    async fn unreachable_server_fails_each_monitor_without_aborting() {
        let dir = folder(&[("01-core.yml", CORE)]);
        let api = Arc::new(FakeApi {
            unreachable: true,
            ..FakeApi::default()
        });
        let report = Reconciler::new(api).run(dir.path()).await.unwrap();

        assert_eq!(report.monitors.len(), 3);
        assert_eq!(report.failed(), 3);
    }

    #[tokio::test]
    async fn failed_existence_check_still_attempts_creation() {
        let dir = folder(&[("01-core.yml", CORE)]);
        let api = Arc::new(FakeApi {
            query_fails: true,
            ..FakeApi::default()
        });
        let report = Reconciler::new(api.clone()).run(dir.path()).await.unwrap();

        assert!(report.monitors.iter().all(|m| m.outcome == Outcome::Created));
        assert_eq!(report.created_tags(), vec!["web", "db", "dns"]);
        assert_eq!(api.created_tags(), vec!["web", "db", "dns"]);
    }

    #[tokio::test]
    async fn bad_folder_aborts_the_run() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(FakeApi::default());
        let result = Reconciler::new(api).run(&dir.path().join("missing")).await;
        assert!(matches!(result, Err(DefinitionError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn empty_folder_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(FakeApi::default());
        let report = Reconciler::new(api.clone()).run(dir.path()).await.unwrap();
        assert!(report.files.is_empty());
        assert!(report.monitors.is_empty());
    }
}
