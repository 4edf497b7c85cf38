// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Aggregate per-issue outcomes into run statistics and persist the finished RunReport
// role: persistence/report
// inputs: IssueOutcome list; RunReport; output target ("-" for stdout or a file path)
// outputs: RunStats, failed issue numbers, shared PRs; pretty JSON written by JsonFileSink
// side_effects: JsonFileSink writes to stdout or the filesystem (creating parent directories)
// invariants:
// - Failed outcomes count only toward `failed`, never toward links or no-links
// - path_a counts explicit links; path_b counts deep links plus no-link verdicts
// - shared_prs is ascending and lists PRs linked to more than one issue
// errors: IO and serialization failures surface as LinkError::Persistence with the target in context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::error::LinkError;
use crate::model::{IssueOutcome, LinkPath, RunReport, RunStats};

/// Receives the finished report once every issue reached a terminal state.
pub trait OutcomeSink: Sync {
  fn persist(&self, report: &RunReport) -> Result<(), LinkError>;
}

pub fn compute_stats(outcomes: &[IssueOutcome]) -> RunStats {
  let mut stats = RunStats {
    total_issues: outcomes.len(),
    ..RunStats::default()
  };

  for o in outcomes {
    match o {
      IssueOutcome::Linked { path, links, .. } => {
        stats.links_created += links.len();
        match path {
          LinkPath::Explicit => stats.path_a += 1,
          LinkPath::Deep => stats.path_b += 1,
        }
      }
      IssueOutcome::NoLink(_) => {
        stats.no_links += 1;
        stats.path_b += 1;
      }
      IssueOutcome::Failed(_) => stats.failed += 1,
    }
  }

  stats
}

pub fn failed_issues(outcomes: &[IssueOutcome]) -> Vec<u64> {
  outcomes.iter().filter(|o| o.is_failed()).map(IssueOutcome::issue_number).collect()
}

/// PRs that ended up linked to more than one issue.
pub fn shared_prs(outcomes: &[IssueOutcome]) -> Vec<u64> {
  let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
  for link in outcomes.iter().flat_map(IssueOutcome::links) {
    *counts.entry(link.pr_number).or_insert(0) += 1;
  }
  counts.into_iter().filter(|(_, n)| *n > 1).map(|(pr, _)| pr).collect()
}

/// Everything in the report except the per-issue outcomes.
pub fn summary(report: &RunReport) -> serde_json::Value {
  serde_json::json!({
    "repository": report.repository,
    "days": report.days,
    "dry_run": report.dry_run,
    "analyzed_at": report.analyzed_at,
    "dora": report.dora,
    "timeline_links_found": report.timeline_links_found,
    "explicit_references_found": report.explicit_references_found,
    "failed_explicit_batches": report.failed_explicit_batches,
    "stats": report.stats,
    "failed_issues": report.failed_issues,
    "shared_prs": report.shared_prs,
  })
}

/// Writes the report as pretty JSON to stdout (`-`) or a file.
pub struct JsonFileSink {
  out: String,
}

impl JsonFileSink {
  pub fn new(out: impl Into<String>) -> Self {
    Self { out: out.into() }
  }
}

impl OutcomeSink for JsonFileSink {
  fn persist(&self, report: &RunReport) -> Result<(), LinkError> {
    let mut bytes =
      serde_json::to_vec_pretty(report).map_err(|e| LinkError::Persistence(format!("serialize report: {}", e)))?;
    bytes.push(b'\n');

    if self.out == "-" {
      let stdout = std::io::stdout();
      let mut lock = stdout.lock();
      return lock
        .write_all(&bytes)
        .and_then(|_| lock.flush())
        .map_err(|e| LinkError::Persistence(format!("stdout: {}", e)));
    }

    let path = Path::new(&self.out);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).map_err(|e| LinkError::Persistence(format!("{}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, &bytes).map_err(|e| LinkError::Persistence(format!("{}: {}", path.display(), e)))?;

    tracing::info!(path = %path.display(), outcomes = report.outcomes.len(), "wrote run report");
    Ok(())
  }
}
