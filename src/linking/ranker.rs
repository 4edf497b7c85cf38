// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Score temporal candidates for semantic similarity with one LLM call per issue and rank them
// role: linking/ranker
// inputs: IssueData; CandidatePr list from the candidate finder; LlmClient
// outputs: Candidates with semantic_scores and ranking_score, sorted best first
// side_effects: One LLM call per issue with at least one candidate
// invariants:
// - ranking_score is computed locally from clamped dimension scores; any model-provided composite is ignored
// - Every candidate must be scored; a missing entry fails the issue
// - Ordering: ranking_score desc, then |delta| asc, then PR number asc
// errors: LlmError (transport, timeout, invalid or incomplete response)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Deserialize;

use super::classifier::truncate_comment;
use super::policy::{self, RankingWeights};
use crate::cancel::CancelToken;
use crate::error::LlmError;
use crate::llm::{parse_json_response, LlmClient, PromptKind};
use crate::model::{CandidatePr, IssueData, SemanticScores};
use crate::util::{iso_utc, truncate_chars};

const PR_DESCRIPTION_CHARS: usize = 1000;
const PR_COMMENT_CHARS: usize = 300;
const MAX_LISTED_FILES: usize = 20;

#[derive(Debug, Deserialize)]
struct RankingResponse {
  #[serde(default)]
  rankings: Vec<RankingEntry>,
}

#[derive(Debug, Deserialize)]
struct RankingEntry {
  pr_number: u64,
  #[serde(default)]
  title_score: f64,
  #[serde(default)]
  body_score: f64,
  #[serde(default)]
  comment_score: f64,
  #[serde(default)]
  file_context_score: f64,
  #[serde(default)]
  title_keywords: Vec<String>,
  #[serde(default)]
  body_keywords: Vec<String>,
  #[serde(default)]
  comment_keywords: Vec<String>,
  #[serde(default)]
  title_rationale: String,
  #[serde(default)]
  body_rationale: String,
  #[serde(default)]
  comment_rationale: String,
  #[serde(default)]
  cross_content_rationale: String,
}

impl RankingEntry {
  fn into_scores(self) -> SemanticScores {
    SemanticScores {
      title_score: policy::unit_score(self.title_score),
      body_score: policy::unit_score(self.body_score),
      comment_score: policy::unit_score(self.comment_score),
      cross_content_score: 0.0,
      file_context_score: policy::unit_score(self.file_context_score),
      title_keywords: self.title_keywords,
      body_keywords: self.body_keywords,
      comment_keywords: self.comment_keywords,
      title_rationale: self.title_rationale,
      body_rationale: self.body_rationale,
      comment_rationale: self.comment_rationale,
      cross_content_rationale: self.cross_content_rationale,
    }
  }
}

/// Merge time relative to the close, in hours, worded by direction.
fn merge_offset(delta_seconds: i64) -> String {
  let hours = delta_seconds.unsigned_abs() as f64 / 3600.0;
  if delta_seconds < 0 {
    format!("{:.1}h after the issue closed", hours)
  } else {
    format!("{:.1}h before the issue closed", hours)
  }
}

pub fn build_ranking_prompt(issue: &IssueData, candidates: &[CandidatePr]) -> String {
  let mut p = String::new();
  let _ = writeln!(p, "ISSUE #{}: {}", issue.number, issue.title);
  let _ = writeln!(p, "DESCRIPTION:\n{}", truncate_comment(issue.body.trim()));

  let _ = writeln!(p, "\nCOMMENTS:");
  for c in &issue.comments {
    let _ = writeln!(p, "- {}: {}", c.author, truncate_comment(&c.body));
  }
  if let Some(last) = issue.closing_comment() {
    let _ = writeln!(p, "\nCLOSING COMMENT ({}):\n{}", last.author, truncate_comment(&last.body));
  }

  let _ = writeln!(p, "\nCANDIDATE PULL REQUESTS ({}):", candidates.len());
  for c in candidates {
    let _ = writeln!(p, "\nPR #{}: {}", c.pr_number, c.title);
    let _ = writeln!(
      p,
      "Merged at: {} ({})",
      iso_utc(&c.merged_at),
      merge_offset(c.temporal_delta_seconds)
    );
    let _ = writeln!(p, "Description: {}", truncate_chars(c.description.trim(), PR_DESCRIPTION_CHARS));
    for comment in &c.comments {
      let _ = writeln!(p, "Comment: {}", truncate_chars(comment.trim(), PR_COMMENT_CHARS));
    }
    if !c.files.is_empty() {
      let listed: Vec<&str> = c.files.iter().take(MAX_LISTED_FILES).map(String::as_str).collect();
      let _ = writeln!(p, "Files: {}", listed.join(", "));
    }
  }

  p
}

fn compare_ranked(a: &CandidatePr, b: &CandidatePr) -> Ordering {
  b.ranking_score
    .total_cmp(&a.ranking_score)
    .then_with(|| a.temporal_delta_seconds.unsigned_abs().cmp(&b.temporal_delta_seconds.unsigned_abs()))
    .then_with(|| a.pr_number.cmp(&b.pr_number))
}

/// Attach model scores to candidates by PR number, compute composites and sort.
pub fn merge_rankings(candidates: Vec<CandidatePr>, raw: &str) -> Result<Vec<CandidatePr>, LlmError> {
  let resp: RankingResponse = parse_json_response(raw)?;
  let mut by_pr: BTreeMap<u64, RankingEntry> = BTreeMap::new();
  for entry in resp.rankings {
    by_pr.entry(entry.pr_number).or_insert(entry);
  }

  let weights = RankingWeights::default();
  let mut ranked = Vec::with_capacity(candidates.len());
  for mut c in candidates {
    let entry = by_pr
      .remove(&c.pr_number)
      .ok_or_else(|| LlmError::InvalidResponse(format!("ranking response is missing PR #{}", c.pr_number)))?;

    c.semantic_scores = entry.into_scores();
    let proximity = policy::temporal_proximity(c.temporal_delta_seconds, c.window_used_days);
    c.ranking_score = policy::ranking_score(proximity, &c.semantic_scores, &weights);
    ranked.push(c);
  }

  ranked.sort_by(compare_ranked);
  Ok(ranked)
}

pub fn rank_candidates(
  llm: &dyn LlmClient,
  cancel: &CancelToken,
  issue: &IssueData,
  candidates: Vec<CandidatePr>,
) -> Result<Vec<CandidatePr>, LlmError> {
  if candidates.is_empty() {
    return Ok(candidates);
  }

  let prompt = build_ranking_prompt(issue, &candidates);
  let raw = llm.complete_json(cancel, PromptKind::CandidateRanking.system_prompt(), &prompt)?;
  let ranked = merge_rankings(candidates, &raw)?;

  tracing::debug!(
    issue = issue.number,
    top_pr = ranked.first().map(|c| c.pr_number),
    top_score = ranked.first().map(|c| c.ranking_score),
    "ranked candidates"
  );

  Ok(ranked)
}
