// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Find merged PRs temporally plausible for a closed issue inside the repository's adaptive window
// role: linking/candidates
// inputs: StagingStore; IssueData with closed_at; DoraMetrics
// outputs: Up to 10 CandidatePr sorted by |delta| ascending, ties by PR number
// invariants:
// - Window is symmetric around closed_at: [closed - w, closed + w]
// - temporal_delta_seconds = closed_at - merged_at (negative → reverse)
// - Semantic fields start zeroed; the ranker fills them
// errors: StoreError from the range query
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use chrono::Duration;

use super::policy::{self, WindowPolicy};
use crate::cancel::CancelToken;
use crate::error::StoreError;
use crate::model::{CandidatePr, DoraMetrics, IssueData, RepoId, SemanticScores, TemporalDirection};
use crate::staging::StagingStore;
use crate::util::signed_seconds_between;

pub const MAX_CANDIDATES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveWindow {
  pub hours: f64,
}

impl AdaptiveWindow {
  pub fn duration(&self) -> Duration {
    Duration::seconds((self.hours * 3600.0).round() as i64)
  }

  pub fn days(&self) -> f64 {
    self.hours / 24.0
  }
}

pub fn adaptive_window(metrics: &DoraMetrics) -> AdaptiveWindow {
  AdaptiveWindow {
    hours: policy::adaptive_window_hours(metrics, &WindowPolicy::default()),
  }
}

pub fn find_candidates(
  store: &dyn StagingStore,
  cancel: &CancelToken,
  repo: RepoId,
  issue: &IssueData,
  window: AdaptiveWindow,
) -> Result<Vec<CandidatePr>, StoreError> {
  let Some(closed_at) = issue.closed_at else {
    return Ok(Vec::new());
  };

  let w = window.duration();
  let prs = store.merged_prs_between(cancel, repo, closed_at - w, closed_at + w)?;

  let mut candidates: Vec<CandidatePr> = prs
    .into_iter()
    .filter_map(|pr| {
      let merged_at = pr.merged_instant()?;
      let delta = signed_seconds_between(merged_at, closed_at);
      Some(CandidatePr {
        pr_number: pr.number,
        title: pr.title,
        description: pr.body,
        comments: pr.comments,
        files: pr.files,
        merged_at,
        temporal_delta_seconds: delta,
        temporal_direction: TemporalDirection::from_delta(delta),
        window_used_days: window.days(),
        semantic_scores: SemanticScores::default(),
        ranking_score: 0.0,
      })
    })
    .collect();

  candidates.sort_by_key(|c| (c.temporal_delta_seconds.unsigned_abs(), c.pr_number));
  candidates.truncate(MAX_CANDIDATES);

  tracing::debug!(
    issue = issue.number,
    window_hours = window.hours,
    candidates = candidates.len(),
    "found temporal candidates"
  );

  Ok(candidates)
}
