// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Drive one linking run: pre-flight, repository phases, per-issue evaluation on a bounded pool, report assembly
// role: linking/orchestrator
// inputs: StagingStore, LlmClient, optional OutcomeSink, CancelToken, RunRequest (repo, days, dry_run), run clock
// outputs: RunReport with one terminal outcome per closed issue, in issue-number order
// side_effects: Store and LLM calls; the sink is invoked once after every issue reached a terminal state
// invariants:
// - Configuration problems abort before any issue is processed
// - Phase 0 and Phase 1 run once; their results are shared read-only by the workers
// - Per-issue errors become Failed outcomes and never NoLink verdicts
// - Cancellation is checked before every store/LLM call
// errors: LinkError (Configuration, Store/Llm during repository phases, Cancelled, Persistence)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use super::candidates::{adaptive_window, find_candidates, AdaptiveWindow};
use super::classifier::classify_closure;
use super::decision::{decide, gated_no_link, Decision};
use super::dora::compute_dora_metrics;
use super::explicit::{extract_explicit_references, merge_references, ReferenceMap};
use super::ranker::rank_candidates;
use super::timeline::extract_timeline_links;
use super::validation::validate_explicit_links;
use crate::cancel::CancelToken;
use crate::error::{LinkError, LinkResult};
use crate::llm::LlmClient;
use crate::model::{FailedIssue, IssueOutcome, LinkPath, RepoId, RunReport};
use crate::report::{compute_stats, failed_issues, shared_prs, OutcomeSink};
use crate::staging::StagingStore;
use crate::util;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct RunRequest {
  /// `owner/name`
  pub repo: String,
  /// Trailing window for DORA metrics (0 = all history).
  pub days: u32,
  pub dry_run: bool,
}

/// Repository-wide inputs shared by every issue of a run.
struct RunContext<'r> {
  repo: RepoId,
  window: AdaptiveWindow,
  references: &'r ReferenceMap,
}

pub struct Linker<'a> {
  store: &'a dyn StagingStore,
  llm: &'a dyn LlmClient,
  sink: Option<&'a dyn OutcomeSink>,
  workers: usize,
  now: DateTime<Utc>,
}

impl<'a> Linker<'a> {
  pub fn new(store: &'a dyn StagingStore, llm: &'a dyn LlmClient, now: DateTime<Utc>) -> Self {
    Self {
      store,
      llm,
      sink: None,
      workers: DEFAULT_WORKERS,
      now,
    }
  }

  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }

  pub fn with_sink(mut self, sink: &'a dyn OutcomeSink) -> Self {
    self.sink = Some(sink);
    self
  }

  pub fn run(&self, cancel: &CancelToken, req: &RunRequest) -> LinkResult<RunReport> {
    // Pre-flight
    if !self.llm.is_enabled() {
      return Err(LinkError::Configuration(
        "LLM client not enabled; set LINKER_LLM_API_KEY or OPENAI_API_KEY".into(),
      ));
    }
    let repository = self
      .store
      .resolve_repository(&req.repo)
      .map_err(|e| LinkError::Configuration(e.to_string()))?;
    if cancel.is_cancelled() {
      return Err(LinkError::Cancelled);
    }

    let issue_numbers = self.store.closed_issue_numbers(cancel, repository.id)?;
    tracing::info!(
      repo = %repository.full_name,
      closed_issues = issue_numbers.len(),
      days = req.days,
      now = %util::iso_utc(&self.now),
      "starting linking run"
    );

    // Phase 0
    let mut dora = compute_dora_metrics(self.store, cancel, repository.id, req.days, self.now)?;
    let timeline = extract_timeline_links(self.store, cancel, repository.id, &issue_numbers)?;
    let timeline_links_found: usize = timeline.values().map(Vec::len).sum();
    dora.cross_reference_links_found = timeline_links_found;

    // Phase 1
    let extraction = extract_explicit_references(self.llm, self.store, cancel, repository.id, &timeline)?;
    let references = merge_references(&timeline, &extraction.references);

    let window = adaptive_window(&dora);
    tracing::info!(
      window_hours = window.hours,
      insufficient_history = dora.insufficient_history,
      timeline_links = timeline_links_found,
      explicit_references = extraction.references.len(),
      "repository phases complete"
    );

    // Phase 2
    let ctx = RunContext {
      repo: repository.id,
      window,
      references: &references,
    };
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(self.workers)
      .build()
      .map_err(|e| LinkError::Configuration(format!("worker pool: {}", e)))?;
    let outcomes: Vec<IssueOutcome> = pool.install(|| {
      issue_numbers
        .par_iter()
        .map(|n| self.process_issue(cancel, &ctx, *n))
        .collect()
    });

    let stats = compute_stats(&outcomes);
    let report = RunReport {
      repository: repository.full_name,
      days: req.days,
      dry_run: req.dry_run,
      analyzed_at: self.now,
      dora,
      timeline_links_found,
      explicit_references_found: extraction.references.len(),
      failed_explicit_batches: extraction.failed_batches,
      failed_issues: failed_issues(&outcomes),
      shared_prs: shared_prs(&outcomes),
      stats,
      outcomes,
    };

    tracing::info!(
      total = report.stats.total_issues,
      path_a = report.stats.path_a,
      path_b = report.stats.path_b,
      links = report.stats.links_created,
      no_links = report.stats.no_links,
      failed = report.stats.failed,
      "linking run finished"
    );

    match self.sink {
      Some(sink) if !req.dry_run => sink.persist(&report)?,
      _ => tracing::debug!(dry_run = req.dry_run, "report not persisted"),
    }

    Ok(report)
  }

  fn process_issue(&self, cancel: &CancelToken, ctx: &RunContext<'_>, issue_number: u64) -> IssueOutcome {
    match self.evaluate_issue(cancel, ctx, issue_number) {
      Ok(outcome) => outcome,
      Err(e) => {
        tracing::warn!(issue = issue_number, kind = ?e.kind(), error = %e, "issue evaluation failed");
        IssueOutcome::Failed(FailedIssue {
          issue_number,
          kind: e.kind(),
          message: e.to_string(),
        })
      }
    }
  }

  fn evaluate_issue(&self, cancel: &CancelToken, ctx: &RunContext<'_>, issue_number: u64) -> LinkResult<IssueOutcome> {
    if cancel.is_cancelled() {
      return Err(LinkError::Cancelled);
    }
    let issue = self.store.issue(cancel, ctx.repo, issue_number)?;

    // Path A
    if let Some(refs) = ctx.references.get(&issue_number).filter(|r| !r.is_empty()) {
      let links = validate_explicit_links(self.llm, self.store, cancel, ctx.repo, &issue, refs)?;
      if !links.is_empty() {
        tracing::debug!(issue = issue_number, links = links.len(), "linked via explicit references");
        return Ok(IssueOutcome::Linked {
          issue_number,
          path: LinkPath::Explicit,
          links,
        });
      }
      tracing::debug!(issue = issue_number, "no usable explicit reference; falling back to deep finder");
    }

    // Path B
    let classification = classify_closure(self.llm, cancel, &issue)?;
    if let Some(no_link) = gated_no_link(&issue, &classification, self.now) {
      return Ok(IssueOutcome::NoLink(no_link));
    }

    let candidates = find_candidates(self.store, cancel, ctx.repo, &issue, ctx.window)?;
    let ranked = rank_candidates(self.llm, cancel, &issue, candidates)?;

    Ok(match decide(&issue, &classification, &ranked, self.now) {
      Decision::Link(links) => IssueOutcome::Linked {
        issue_number,
        path: LinkPath::Deep,
        links,
      },
      Decision::NoLink(no_link) => IssueOutcome::NoLink(no_link),
    })
  }
}
