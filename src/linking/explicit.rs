// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Extract explicit issue references from merged PR text in LLM batches and merge them with timeline links (Phase 1)
// role: linking/explicit
// inputs: StagingStore merged PRs; TimelineLinks from Phase 0; LlmClient
// outputs: ExplicitExtraction (references per issue, failed batch PR numbers)
// side_effects: One LLM call per batch of 10 merged PRs
// invariants:
// - A failed batch is logged and recorded; the run continues with the remaining batches
// - External-repository references and (issue, PR) pairs already verified by the timeline are dropped
// - Per issue and PR the timeline reference wins, then the highest base confidence
// errors: StoreError from the merged-PR query; cancellation aborts the phase
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::Deserialize;

use super::policy;
use super::timeline::TimelineLinks;
use crate::cancel::CancelToken;
use crate::error::{LinkError, LlmError};
use crate::llm::{parse_json_response, LlmClient, PromptKind};
use crate::model::{
  DetectionMethod, ExplicitReference, PullRequestData, ReferenceLocation, ReferenceType, RepoId, TimelineLink,
};
use crate::staging::StagingStore;
use crate::util::truncate_chars;

pub const EXTRACTION_BATCH_SIZE: usize = 10;

const PR_BODY_CHARS: usize = 2000;
const PR_COMMENT_CHARS: usize = 300;
const MAX_PR_COMMENTS: usize = 5;

/// References per issue number, usable as Path A input.
pub type ReferenceMap = BTreeMap<u64, Vec<ExplicitReference>>;

#[derive(Debug, Clone, Default)]
pub struct ExplicitExtraction {
  /// References found by the LLM, after dropping external and timeline-duplicate ones.
  pub references: Vec<ExplicitReference>,
  /// PR numbers of every batch whose extraction failed.
  pub failed_batches: Vec<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
  #[serde(default)]
  results: Vec<ExtractionResult>,
}

#[derive(Debug, Deserialize)]
struct ExtractionResult {
  pr_number: u64,
  #[serde(default)]
  references: Vec<ExtractedReference>,
}

#[derive(Debug, Deserialize)]
struct ExtractedReference {
  issue_number: serde_json::Value,
  #[serde(default)]
  reference_type: String,
  #[serde(default)]
  reference_location: String,
  #[serde(default)]
  extracted_text: String,
  #[serde(default)]
  base_confidence: Option<f64>,
  #[serde(default)]
  external_repo: bool,
}

/// Issue number given as 123, "123" or "#123".
fn parse_issue_number(v: &serde_json::Value) -> Option<u64> {
  match v {
    serde_json::Value::Number(n) => n.as_u64(),
    serde_json::Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
    _ => None,
  }
}

fn default_base_confidence(t: ReferenceType) -> f64 {
  match t {
    ReferenceType::Fixes => 0.90,
    ReferenceType::Addresses | ReferenceType::For => 0.80,
    ReferenceType::Mentions => 0.65,
    ReferenceType::Other => 0.60,
  }
}

pub fn build_extraction_prompt(batch: &[PullRequestData]) -> String {
  let mut p = String::new();
  let _ = writeln!(p, "Extract issue references from these {} pull requests.", batch.len());
  for pr in batch {
    let _ = writeln!(p, "\nPR #{}", pr.number);
    let _ = writeln!(p, "Title: {}", pr.title);
    let _ = writeln!(p, "Description: {}", truncate_chars(pr.body.trim(), PR_BODY_CHARS));
    for c in pr.comments.iter().take(MAX_PR_COMMENTS) {
      let _ = writeln!(p, "Comment: {}", truncate_chars(c.trim(), PR_COMMENT_CHARS));
    }
  }
  p
}

/// Parse one batch response, keeping references to known issues from PRs of the batch.
pub fn parse_extraction(raw: &str, batch: &[u64], known_issues: &BTreeSet<u64>) -> Result<Vec<ExplicitReference>, LlmError> {
  let resp: ExtractionResponse = parse_json_response(raw)?;
  let mut out = Vec::new();

  for result in resp.results {
    if !batch.contains(&result.pr_number) {
      continue;
    }
    for r in result.references {
      if r.external_repo {
        continue;
      }
      let Some(issue_number) = parse_issue_number(&r.issue_number) else {
        continue;
      };
      if !known_issues.contains(&issue_number) {
        continue;
      }

      let reference_type = ReferenceType::from_label(&r.reference_type);
      let base_confidence = policy::unit_score(r.base_confidence.unwrap_or_else(|| default_base_confidence(reference_type)));
      out.push(ExplicitReference {
        issue_number,
        pr_number: result.pr_number,
        reference_type,
        reference_location: ReferenceLocation::from_label(&r.reference_location),
        extracted_text: r.extracted_text,
        base_confidence,
        detection_method: DetectionMethod::Explicit,
      });
    }
  }

  Ok(out)
}

pub fn extract_explicit_references(
  llm: &dyn LlmClient,
  store: &dyn StagingStore,
  cancel: &CancelToken,
  repo: RepoId,
  timeline: &TimelineLinks,
) -> Result<ExplicitExtraction, LinkError> {
  let merged = store.merged_prs_since(cancel, repo, None)?;
  let known_issues: BTreeSet<u64> = timeline.keys().copied().collect();
  let verified: BTreeSet<(u64, u64)> = timeline
    .values()
    .flatten()
    .map(|l| (l.issue_number, l.pr_number))
    .collect();

  let mut extraction = ExplicitExtraction::default();
  let batches = merged.chunks(EXTRACTION_BATCH_SIZE);
  let batch_count = batches.len();

  for (idx, batch) in batches.enumerate() {
    let numbers: Vec<u64> = batch.iter().map(|pr| pr.number).collect();
    let prompt = build_extraction_prompt(batch);

    let parsed = llm
      .complete_json(cancel, PromptKind::ExplicitExtraction.system_prompt(), &prompt)
      .and_then(|raw| parse_extraction(&raw, &numbers, &known_issues));

    match parsed {
      Ok(refs) => {
        let before = extraction.references.len();
        extraction
          .references
          .extend(refs.into_iter().filter(|r| !verified.contains(&(r.issue_number, r.pr_number))));
        tracing::debug!(
          batch = idx + 1,
          of = batch_count,
          found = extraction.references.len() - before,
          "extracted explicit references"
        );
      }
      Err(LlmError::Cancelled) => return Err(LinkError::Cancelled),
      Err(e) => {
        tracing::warn!(batch = idx + 1, of = batch_count, prs = ?numbers, error = %e, "explicit extraction batch failed");
        extraction.failed_batches.push(numbers);
      }
    }
  }

  tracing::info!(
    merged_prs = merged.len(),
    references = extraction.references.len(),
    failed_batches = extraction.failed_batches.len(),
    "explicit reference extraction finished"
  );

  Ok(extraction)
}

pub fn timeline_to_explicit(link: &TimelineLink) -> ExplicitReference {
  ExplicitReference {
    issue_number: link.issue_number,
    pr_number: link.pr_number,
    reference_type: link.reference_type,
    reference_location: ReferenceLocation::TimelineApi,
    extracted_text: link.extracted_text.clone(),
    base_confidence: link.base_confidence,
    detection_method: DetectionMethod::GithubTimelineVerified,
  }
}

/// Merge timeline and extracted references per issue, one reference per PR.
pub fn merge_references(timeline: &TimelineLinks, extracted: &[ExplicitReference]) -> ReferenceMap {
  let mut merged: ReferenceMap = BTreeMap::new();

  for link in timeline.values().flatten() {
    merged.entry(link.issue_number).or_default().push(timeline_to_explicit(link));
  }

  for r in extracted {
    let refs = merged.entry(r.issue_number).or_default();
    match refs.iter_mut().find(|e| e.pr_number == r.pr_number) {
      Some(existing) => {
        if existing.detection_method != DetectionMethod::GithubTimelineVerified
          && r.base_confidence > existing.base_confidence
        {
          *existing = r.clone();
        }
      }
      None => refs.push(r.clone()),
    }
  }

  merged.retain(|_, refs| !refs.is_empty());
  for refs in merged.values_mut() {
    refs.sort_by_key(|r| r.pr_number);
  }
  merged
}
