// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: File-backed StagingStore over a staged snapshot JSON (repository, pull_requests, issues, timeline_events)
// role: staging/snapshot
// inputs: Path to a snapshot JSON file, or an in-memory Snapshot
// outputs: Deterministically ordered query results per the StagingStore contract
// side_effects: Reads the snapshot file once at open
// invariants:
// - Snapshot is normalized at load: comments sorted oldest first, events sorted, maps keyed by number
// - Queries for a repository other than the staged one fail with RepositoryNotFound
// errors: Missing file → Unavailable; bad JSON → Malformed
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ensure_active, StagingStore};
use crate::cancel::CancelToken;
use crate::error::StoreError;
use crate::model::{IssueData, PullRequestData, RepoId, Repository, TimelineEvent};

/// On-disk shape of a staged repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
  pub repository: Repository,
  #[serde(default)]
  pub pull_requests: Vec<PullRequestData>,
  #[serde(default)]
  pub issues: Vec<IssueData>,
  #[serde(default)]
  pub timeline_events: Vec<TimelineEvent>,
}

pub struct SnapshotStore {
  repository: Repository,
  pull_requests: BTreeMap<u64, PullRequestData>,
  issues: BTreeMap<u64, IssueData>,
  events: Vec<TimelineEvent>,
}

impl SnapshotStore {
  pub fn open(path: &str) -> Result<Self, StoreError> {
    let data = std::fs::read(path).map_err(|e| StoreError::Unavailable(format!("{}: {}", path, e)))?;
    let snapshot: Snapshot = serde_json::from_slice(&data)?;

    tracing::debug!(
      path,
      pull_requests = snapshot.pull_requests.len(),
      issues = snapshot.issues.len(),
      events = snapshot.timeline_events.len(),
      "loaded staging snapshot"
    );

    Ok(Self::from_snapshot(snapshot))
  }

  pub fn from_snapshot(snapshot: Snapshot) -> Self {
    let pull_requests = snapshot.pull_requests.into_iter().map(|pr| (pr.number, pr)).collect();

    let issues = snapshot
      .issues
      .into_iter()
      .map(|mut issue| {
        issue.comments.sort_by_key(|c| c.created_at);
        (issue.number, issue)
      })
      .collect();

    let mut events = snapshot.timeline_events;
    events.sort_by(|a, b| {
      (a.issue_number, a.source_number, a.created_at).cmp(&(b.issue_number, b.source_number, b.created_at))
    });

    Self {
      repository: snapshot.repository,
      pull_requests,
      issues,
      events,
    }
  }

  fn check_repo(&self, repo: RepoId) -> Result<(), StoreError> {
    if repo == self.repository.id {
      Ok(())
    } else {
      Err(StoreError::RepositoryNotFound(format!("id {}", repo)))
    }
  }

  fn merged_sorted<F>(&self, keep: F) -> Vec<PullRequestData>
  where
    F: Fn(DateTime<Utc>) -> bool,
  {
    let mut out: Vec<PullRequestData> = self
      .pull_requests
      .values()
      .filter(|pr| pr.merged_instant().is_some_and(&keep))
      .cloned()
      .collect();
    out.sort_by_key(|pr| (pr.merged_at, pr.number));
    out
  }
}

impl StagingStore for SnapshotStore {
  fn resolve_repository(&self, full_name: &str) -> Result<Repository, StoreError> {
    if self.repository.full_name.eq_ignore_ascii_case(full_name) {
      Ok(self.repository.clone())
    } else {
      Err(StoreError::RepositoryNotFound(full_name.to_string()))
    }
  }

  fn merged_prs_between(
    &self,
    cancel: &CancelToken,
    repo: RepoId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Result<Vec<PullRequestData>, StoreError> {
    ensure_active(cancel)?;
    self.check_repo(repo)?;
    Ok(self.merged_sorted(|merged| merged >= start && merged <= end))
  }

  fn merged_prs_since(
    &self,
    cancel: &CancelToken,
    repo: RepoId,
    cutoff: Option<DateTime<Utc>>,
  ) -> Result<Vec<PullRequestData>, StoreError> {
    ensure_active(cancel)?;
    self.check_repo(repo)?;
    Ok(self.merged_sorted(|merged| cutoff.map_or(true, |c| merged >= c)))
  }

  fn closed_issue_numbers(&self, cancel: &CancelToken, repo: RepoId) -> Result<Vec<u64>, StoreError> {
    ensure_active(cancel)?;
    self.check_repo(repo)?;
    Ok(
      self
        .issues
        .values()
        .filter(|i| i.state.eq_ignore_ascii_case("closed") && i.closed_at.is_some())
        .map(|i| i.number)
        .collect(),
    )
  }

  fn issue(&self, cancel: &CancelToken, repo: RepoId, number: u64) -> Result<IssueData, StoreError> {
    ensure_active(cancel)?;
    self.check_repo(repo)?;
    self
      .issues
      .get(&number)
      .cloned()
      .ok_or(StoreError::NotFound { kind: "issue", number })
  }

  fn pull_request(&self, cancel: &CancelToken, repo: RepoId, number: u64) -> Result<PullRequestData, StoreError> {
    ensure_active(cancel)?;
    self.check_repo(repo)?;
    self
      .pull_requests
      .get(&number)
      .cloned()
      .ok_or(StoreError::NotFound {
        kind: "pull request",
        number,
      })
  }

  fn cross_reference_events(&self, cancel: &CancelToken, repo: RepoId) -> Result<Vec<TimelineEvent>, StoreError> {
    ensure_active(cancel)?;
    self.check_repo(repo)?;
    Ok(
      self
        .events
        .iter()
        .filter(|e| e.event_type == "cross-referenced")
        .cloned()
        .collect(),
    )
  }
}
