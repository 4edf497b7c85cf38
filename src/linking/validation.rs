// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Validate explicit and timeline references of an issue into scored links (Path A)
// role: linking/validation
// inputs: IssueData with closed_at; merged ExplicitReference list; StagingStore (PR lookup); LlmClient (semantic scores)
// outputs: Up to three LinkOutput per issue, highest confidence first; empty when no reference is usable
// side_effects: One LLM call per usable reference
// invariants:
// - A reference is usable only when its PR exists and merged and the issue has a close time
// - final_confidence = clamp(base + bidirectional + semantic + temporal + penalty, 0, 0.98)
// - Temporal boosts apply only when the PR merged before the issue closed
// errors: LlmError for semantic analysis is fatal for the issue; missing PRs are skipped
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;

use super::classifier::truncate_comment;
use super::policy::{self, ExplicitPolicy};
use crate::cancel::CancelToken;
use crate::error::{LinkError, LlmError, StoreError};
use crate::llm::{parse_json_response, LlmClient, PromptKind};
use crate::model::{
  ConfidenceBreakdown, DetectionMethod, ExplicitReference, IssueData, LinkFlags, LinkOutput, PullRequestData, RepoId,
  SemanticScores, TemporalAnalysis, TemporalDirection,
};
use crate::staging::StagingStore;
use crate::util::{signed_seconds_between, truncate_chars};

pub const MAX_EXPLICIT_LINKS: usize = 3;

const STRONG_NEGATIVE_PHRASES: [&str; 5] = ["not fixed", "still broken", "doesn't work", "does not work", "still happening"];
const PARTIAL_NEGATIVE_PHRASES: [&str; 2] = ["partially fixed", "some issues remain"];

const PR_BODY_CHARS: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidirectionalSignal {
  pub mentioned: bool,
  pub in_closing_comment: bool,
  pub boost: f64,
  /// Zero or negative.
  pub negative_penalty: f64,
}

/// Look for the PR in the issue thread, and for complaints posted after it merged.
pub fn detect_bidirectional(
  issue: &IssueData,
  pr_number: u64,
  merged_at: DateTime<Utc>,
  p: &ExplicitPolicy,
) -> BidirectionalSignal {
  // `#N`, `PR #N` and `pull request #N` all end in `#N`.
  let Ok(re) = Regex::new(&format!(r"(?:#|pull/){}\b", pr_number)) else {
    return BidirectionalSignal::default();
  };

  let in_body = re.is_match(&issue.body);
  let in_comments = issue.comments.iter().any(|c| re.is_match(&c.body));
  let in_closing_comment = issue.closing_comment().is_some_and(|c| re.is_match(&c.body));
  let mentioned = in_body || in_comments;

  let mut boost = 0.0;
  if mentioned {
    boost += p.bidirectional_boost;
    if in_closing_comment {
      boost += p.closing_comment_boost;
    }
  }

  let mut negative_penalty: f64 = 0.0;
  for c in issue.comments.iter().filter(|c| c.created_at > merged_at) {
    let body = c.body.to_lowercase();
    if STRONG_NEGATIVE_PHRASES.iter().any(|s| body.contains(s)) {
      negative_penalty = negative_penalty.min(p.strong_negative_penalty);
    } else if PARTIAL_NEGATIVE_PHRASES.iter().any(|s| body.contains(s)) {
      negative_penalty = negative_penalty.min(p.partial_negative_penalty);
    }
  }

  BidirectionalSignal {
    mentioned,
    in_closing_comment,
    boost,
    negative_penalty,
  }
}

pub fn build_semantic_prompt(issue: &IssueData, pr: &PullRequestData) -> String {
  let mut p = String::new();
  let _ = writeln!(p, "ISSUE #{}: {}", issue.number, issue.title);
  let _ = writeln!(p, "DESCRIPTION:\n{}", truncate_comment(issue.body.trim()));
  let _ = writeln!(p, "\nCOMMENTS:");
  for c in &issue.comments {
    let _ = writeln!(p, "- {}: {}", c.author, truncate_comment(&c.body));
  }

  let _ = writeln!(p, "\nPULL REQUEST #{}: {}", pr.number, pr.title);
  let _ = writeln!(p, "DESCRIPTION:\n{}", truncate_chars(pr.body.trim(), PR_BODY_CHARS));
  if !pr.files.is_empty() {
    let _ = writeln!(p, "FILES: {}", pr.files.join(", "));
  }
  p
}

#[derive(Debug, Deserialize)]
struct SemanticResponse {
  #[serde(default)]
  title_score: f64,
  #[serde(default)]
  body_score: f64,
  #[serde(default)]
  comment_score: f64,
  #[serde(default)]
  cross_content_score: f64,
  #[serde(default)]
  title_rationale: String,
  #[serde(default)]
  body_rationale: String,
  #[serde(default)]
  comment_rationale: String,
  #[serde(default)]
  cross_content_rationale: String,
}

pub fn parse_semantic(raw: &str) -> Result<SemanticScores, LlmError> {
  let r: SemanticResponse = parse_json_response(raw)?;
  Ok(SemanticScores {
    title_score: policy::unit_score(r.title_score),
    body_score: policy::unit_score(r.body_score),
    comment_score: policy::unit_score(r.comment_score),
    cross_content_score: policy::unit_score(r.cross_content_score),
    title_rationale: r.title_rationale,
    body_rationale: r.body_rationale,
    comment_rationale: r.comment_rationale,
    cross_content_rationale: r.cross_content_rationale,
    ..SemanticScores::default()
  })
}

pub fn analyze_semantic_similarity(
  llm: &dyn LlmClient,
  cancel: &CancelToken,
  issue: &IssueData,
  pr: &PullRequestData,
) -> Result<SemanticScores, LlmError> {
  let prompt = build_semantic_prompt(issue, pr);
  let raw = llm.complete_json(cancel, PromptKind::ExplicitSemantic.system_prompt(), &prompt)?;
  parse_semantic(&raw)
}

pub fn explicit_temporal_analysis(closed_at: DateTime<Utc>, merged_at: DateTime<Utc>, p: &ExplicitPolicy) -> TemporalAnalysis {
  let delta = signed_seconds_between(merged_at, closed_at);
  TemporalAnalysis {
    issue_closed_at: closed_at,
    pr_merged_at: merged_at,
    delta_seconds: delta,
    pattern: policy::explicit_temporal_pattern(delta, p),
    direction: TemporalDirection::from_delta(delta),
  }
}

fn explicit_rationale(
  r: &ExplicitReference,
  method: DetectionMethod,
  confidence: f64,
  bidi: &BidirectionalSignal,
  semantic: &SemanticScores,
  temporal: &TemporalAnalysis,
) -> String {
  let mut s = format!("EXPLICIT LINK via {} (confidence: {:.2})", method, confidence);
  let _ = write!(
    s,
    "\nReference: {} in {} \"{}\" (base {:.2})",
    r.reference_type,
    r.reference_location.as_str(),
    r.extracted_text,
    r.base_confidence
  );
  if bidi.mentioned {
    let where_ = if bidi.in_closing_comment { "closing comment" } else { "issue thread" };
    let _ = write!(s, "\nBidirectional: issue mentions PR #{} in the {}", r.pr_number, where_);
  }
  if bidi.negative_penalty < 0.0 {
    let _ = write!(s, "\nNegative signal: post-merge comments report the problem persists ({:+.2})", bidi.negative_penalty);
  }
  let _ = write!(
    s,
    "\nSemantic: title {:.2}, body {:.2}, comment {:.2}, cross-content {:.2}",
    semantic.title_score, semantic.body_score, semantic.comment_score, semantic.cross_content_score
  );
  let _ = write!(
    s,
    "\nTemporal: delta {}s ({}, {})",
    temporal.delta_seconds,
    temporal.pattern.as_str(),
    temporal.direction.as_str()
  );
  s
}

/// Combine the evidence for one reference into a scored link.
pub fn build_explicit_link(
  reference: &ExplicitReference,
  closed_at: DateTime<Utc>,
  merged_at: DateTime<Utc>,
  bidi: &BidirectionalSignal,
  semantic: SemanticScores,
  p: &ExplicitPolicy,
) -> LinkOutput {
  let temporal = explicit_temporal_analysis(closed_at, merged_at, p);
  let semantic_boost = policy::semantic_boost(semantic.max_score());
  let temporal_boost = policy::temporal_boost(temporal.delta_seconds);
  let final_confidence = policy::explicit_confidence(
    reference.base_confidence,
    bidi.boost,
    semantic_boost,
    temporal_boost,
    bidi.negative_penalty,
    p,
  );

  let method = if bidi.mentioned {
    DetectionMethod::ExplicitBidirectional
  } else {
    reference.detection_method
  };

  let mut evidence = vec![method.as_str().to_string()];
  if bidi.mentioned {
    evidence.push("bidirectional".into());
  }
  for (score, tag) in [
    (semantic.title_score, "semantic_title"),
    (semantic.body_score, "semantic_body"),
    (semantic.cross_content_score, "semantic_cross"),
  ] {
    if score >= 0.5 {
      evidence.push(tag.into());
    }
  }
  if temporal_boost > 0.0 {
    evidence.push("temporal".into());
  }
  if bidi.negative_penalty < 0.0 {
    evidence.push("negative_signal".into());
  }

  let rationale = explicit_rationale(reference, method, final_confidence, bidi, &semantic, &temporal);
  let reversed = temporal.direction == TemporalDirection::Reverse;

  LinkOutput {
    issue_number: reference.issue_number,
    pr_number: reference.pr_number,
    detection_method: method,
    final_confidence,
    link_quality: policy::explicit_link_quality(final_confidence, p),
    confidence_breakdown: ConfidenceBreakdown {
      base_confidence: reference.base_confidence,
      bidirectional_boost: bidi.boost,
      semantic_boost,
      temporal_boost,
      negative_signal_penalty: bidi.negative_penalty,
    },
    evidence_sources: evidence,
    comprehensive_rationale: rationale,
    semantic_analysis: Some(semantic),
    temporal_analysis: temporal,
    flags: LinkFlags {
      needs_manual_review: final_confidence < p.manual_review_below,
      reverse_temporal: reversed,
    },
  }
}

/// Validate one reference against a merged PR.
pub fn validate_explicit_link(
  llm: &dyn LlmClient,
  cancel: &CancelToken,
  issue: &IssueData,
  closed_at: DateTime<Utc>,
  pr: &PullRequestData,
  merged_at: DateTime<Utc>,
  reference: &ExplicitReference,
) -> Result<LinkOutput, LlmError> {
  let p = ExplicitPolicy::default();
  let bidi = detect_bidirectional(issue, pr.number, merged_at, &p);
  let semantic = analyze_semantic_similarity(llm, cancel, issue, pr)?;
  Ok(build_explicit_link(reference, closed_at, merged_at, &bidi, semantic, &p))
}

/// Validate every usable reference of an issue; empty when none is usable.
pub fn validate_explicit_links(
  llm: &dyn LlmClient,
  store: &dyn StagingStore,
  cancel: &CancelToken,
  repo: RepoId,
  issue: &IssueData,
  references: &[ExplicitReference],
) -> Result<Vec<LinkOutput>, LinkError> {
  let Some(closed_at) = issue.closed_at else {
    return Ok(Vec::new());
  };

  let mut links = Vec::new();
  for r in references {
    let pr = match store.pull_request(cancel, repo, r.pr_number) {
      Ok(pr) => pr,
      Err(StoreError::NotFound { .. }) => {
        tracing::debug!(issue = issue.number, pr = r.pr_number, "referenced PR not staged; skipping");
        continue;
      }
      Err(e) => return Err(e.into()),
    };
    let Some(merged_at) = pr.merged_instant() else {
      tracing::debug!(issue = issue.number, pr = r.pr_number, "referenced PR not merged; skipping");
      continue;
    };

    links.push(validate_explicit_link(llm, cancel, issue, closed_at, &pr, merged_at, r)?);
  }

  links.sort_by(|a, b| {
    b.final_confidence
      .total_cmp(&a.final_confidence)
      .then_with(|| a.pr_number.cmp(&b.pr_number))
  });
  links.truncate(MAX_EXPLICIT_LINKS);
  Ok(links)
}
