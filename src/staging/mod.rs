// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Read-only seam over the staged GitHub data (issues, PRs, timeline events) the linker consumes
// role: staging/store-trait
// inputs: repository id, timestamp ranges, issue/PR numbers, cancellation token
// outputs: Typed IssueData/PullRequestData/TimelineEvent values in deterministic order
// side_effects: Implementations may read files or databases; the trait itself is pure
// invariants:
// - Every query honors the cancellation token before doing work
// - Results are deterministically ordered (see per-method docs)
// - Issue comments are ordered oldest first
// errors: StoreError; callers map it into the per-issue or batch-level taxonomy
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use chrono::{DateTime, Utc};

use crate::cancel::CancelToken;
use crate::error::StoreError;
use crate::model::{IssueData, PullRequestData, RepoId, Repository, TimelineEvent};

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotStore};

// --- Trait seam for the staging store ---
pub trait StagingStore: Send + Sync {
  /// Resolve `owner/name` to a staged repository.
  fn resolve_repository(&self, full_name: &str) -> Result<Repository, StoreError>;

  /// Merged PRs with `start <= merged_at <= end`, ordered by merged_at then number.
  fn merged_prs_between(
    &self,
    cancel: &CancelToken,
    repo: RepoId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Result<Vec<PullRequestData>, StoreError>;

  /// Merged PRs with `merged_at >= cutoff` (all merged PRs when `cutoff` is None),
  /// ordered by merged_at then number.
  fn merged_prs_since(
    &self,
    cancel: &CancelToken,
    repo: RepoId,
    cutoff: Option<DateTime<Utc>>,
  ) -> Result<Vec<PullRequestData>, StoreError>;

  /// Numbers of closed issues that have a close timestamp, ascending.
  fn closed_issue_numbers(&self, cancel: &CancelToken, repo: RepoId) -> Result<Vec<u64>, StoreError>;

  /// Full issue with its ordered comment thread.
  fn issue(&self, cancel: &CancelToken, repo: RepoId, number: u64) -> Result<IssueData, StoreError>;

  fn pull_request(&self, cancel: &CancelToken, repo: RepoId, number: u64) -> Result<PullRequestData, StoreError>;

  /// Cross-reference timeline events, ordered by issue number, source number, then time.
  fn cross_reference_events(&self, cancel: &CancelToken, repo: RepoId) -> Result<Vec<TimelineEvent>, StoreError>;
}

/// Open the file-backed store the CLI uses.
pub fn make_snapshot_store(path: &str) -> Result<Box<dyn StagingStore>, StoreError> {
  Ok(Box::new(SnapshotStore::open(path)?))
}

/// Fail fast when the caller already gave up.
pub(crate) fn ensure_active(cancel: &CancelToken) -> Result<(), StoreError> {
  if cancel.is_cancelled() {
    Err(StoreError::Cancelled)
  } else {
    Ok(())
  }
}
