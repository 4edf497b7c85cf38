// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Compute the repository's median PR lead time over a trailing window (DORA lead time for changes)
// role: linking/dora
// inputs: StagingStore, repository id, trailing window in days (0 = all history), run clock
// outputs: DoraMetrics (median hours, sample size, insufficient-history flag)
// invariants:
// - Median interpolates between the two middle values for even sample sizes
// - Empty sample yields median 0 with insufficient_history = true
// - cross_reference_links_found is left at 0 here; the orchestrator fills it
// errors: StoreError from the merged-PR query
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use chrono::{DateTime, Duration, Utc};

use super::policy;
use crate::cancel::CancelToken;
use crate::error::StoreError;
use crate::model::{DoraMetrics, RepoId};
use crate::staging::StagingStore;

/// Continuous median of `values` (sorted in place). Empty input yields 0.
pub fn median(values: &mut [f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }

  values.sort_by(|a, b| a.total_cmp(b));
  let mid = values.len() / 2;
  if values.len() % 2 == 1 {
    values[mid]
  } else {
    (values[mid - 1] + values[mid]) / 2.0
  }
}

pub fn compute_dora_metrics(
  store: &dyn StagingStore,
  cancel: &CancelToken,
  repo: RepoId,
  days: u32,
  now: DateTime<Utc>,
) -> Result<DoraMetrics, StoreError> {
  let cutoff = match days {
    0 => None,
    d => {
      let c = Duration::try_days(i64::from(d)).and_then(|span| now.checked_sub_signed(span));
      if c.is_none() {
        tracing::warn!(days, "trailing window reaches past the calendar; using all history");
      }
      c
    }
  };
  let merged = store.merged_prs_since(cancel, repo, cutoff)?;

  let mut lead_times: Vec<f64> = merged
    .iter()
    .filter_map(|pr| pr.merged_instant().map(|m| (m - pr.created_at).num_seconds() as f64 / 3600.0))
    .collect();

  let sample_size = lead_times.len();
  let median_lead_time_hours = median(&mut lead_times);
  let insufficient_history = policy::is_insufficient_history(sample_size);

  if insufficient_history {
    tracing::info!(sample_size, days, "insufficient merge history; using fixed candidate window");
  }
  tracing::debug!(median_lead_time_hours, sample_size, "computed DORA lead time");

  Ok(DoraMetrics {
    median_lead_time_hours,
    sample_size,
    insufficient_history,
    cross_reference_links_found: 0,
    computed_over_days: days,
  })
}
