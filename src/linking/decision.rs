// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Decide between deep links and a reasoned no-link verdict for one ranked issue (pure state machine)
// role: linking/decision
// inputs: IssueData, BugClassificationResult, ranked CandidatePr list, run instant
// outputs: Decision::Link(1..=3 LinkOutput) or Decision::NoLink(NoLinkOutput)
// invariants:
// - Rules run in strict order: no candidates, weak classification, safety brake, selection
// - final_confidence = min(0.85, 0.50 + 0.35 * score) and never below 0.50
// - At most three links, best first
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use chrono::{DateTime, Duration, Utc};

use super::classifier::should_proceed_to_deep_finder;
use super::policy::{self, DecisionThresholds};
use crate::model::{
  BugClassificationResult, CandidatePr, ConfidenceBreakdown, DetectionMethod, IssueData, LinkFlags, LinkOutput,
  NoLinkOutput, NoLinkReason, TemporalAnalysis, TemporalDirection,
};

pub const DEEP_EVIDENCE_SOURCES: [&str; 4] = ["temporal", "semantic_comment", "semantic_body", "semantic_title"];

pub const SAFETY_BRAKE_REASON: &str = "temporal_proximity < 0.20 and all semantic < 0.50";

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
  Link(Vec<LinkOutput>),
  NoLink(NoLinkOutput),
}

struct Verdict<'a> {
  issue: &'a IssueData,
  classification: &'a BugClassificationResult,
  analyzed_at: DateTime<Utc>,
}

impl Verdict<'_> {
  fn no_link(&self, reason: NoLinkReason, evaluated: usize, best: f64, brake: Option<String>) -> NoLinkOutput {
    NoLinkOutput {
      issue_number: self.issue.number,
      reason,
      classification: self.classification.closure_classification,
      classification_confidence: self.classification.classification_confidence,
      classification_rationale: self.classification.classification_rationale.clone(),
      conversation_summary: self.classification.conversation_summary.clone(),
      candidates_evaluated: evaluated,
      best_candidate_score: best,
      safety_brake_reason: brake,
      issue_closed_at: self.issue.closed_at,
      analyzed_at: self.analyzed_at,
    }
  }
}

/// NoLink verdict for an issue whose closure type closes the deep finder gate.
pub fn gated_no_link(
  issue: &IssueData,
  classification: &BugClassificationResult,
  analyzed_at: DateTime<Utc>,
) -> Option<NoLinkOutput> {
  if should_proceed_to_deep_finder(classification) {
    return None;
  }

  let reason = NoLinkReason::from_closure(classification.closure_classification)?;
  let v = Verdict {
    issue,
    classification,
    analyzed_at,
  };
  Some(v.no_link(reason, 0, 0.0, None))
}

fn describe_delta(delta_seconds: i64) -> String {
  let hours = delta_seconds.unsigned_abs() as f64 / 3600.0;
  if delta_seconds < 0 {
    format!("PR merged {:.1}h after issue closed", hours)
  } else {
    format!("PR merged {:.1}h before issue closed", hours)
  }
}

fn deep_rationale(
  c: &CandidatePr,
  classification: &BugClassificationResult,
  confidence: f64,
  proximity: f64,
  analysis: &TemporalAnalysis,
  rank: usize,
  total: usize,
) -> String {
  let s = &c.semantic_scores;
  let lines = [
    format!("DEEP LINK found via temporal-semantic analysis (confidence: {:.2})", confidence),
    format!("Detection method: {}", DetectionMethod::DeepLinkFinder),
    format!(
      "Classification: {} (confidence: {:.2})",
      classification.closure_classification, classification.classification_confidence
    ),
    format!(
      "Temporal: {} (pattern: {}, window: ±{:.1} days, proximity: {:.2})",
      describe_delta(c.temporal_delta_seconds),
      analysis.pattern.as_str(),
      c.window_used_days,
      proximity
    ),
    format!(
      "Semantic: title {:.2}, body {:.2}, comment {:.2}, file context {:.2}",
      s.title_score, s.body_score, s.comment_score, s.file_context_score
    ),
    format!("Ranking score: {:.3} (rank {} of {})", c.ranking_score, rank + 1, total),
  ];
  lines.join("\n")
}

fn deep_link(
  issue_number: u64,
  c: &CandidatePr,
  rank: usize,
  ranked: &[CandidatePr],
  classification: &BugClassificationResult,
  t: &DecisionThresholds,
) -> LinkOutput {
  let confidence = policy::deep_link_confidence(c.ranking_score, t);
  let proximity = policy::temporal_proximity(c.temporal_delta_seconds, c.window_used_days);
  let runner_up = ranked.get(1).map(|r| r.ranking_score);
  let top = ranked.first().map_or(c.ranking_score, |r| r.ranking_score);
  let reversed = c.temporal_direction == TemporalDirection::Reverse;

  let temporal_analysis = TemporalAnalysis {
    issue_closed_at: c.merged_at + Duration::seconds(c.temporal_delta_seconds),
    pr_merged_at: c.merged_at,
    delta_seconds: c.temporal_delta_seconds,
    pattern: policy::deep_temporal_pattern(c.temporal_delta_seconds, c.temporal_direction, t),
    direction: c.temporal_direction,
  };

  LinkOutput {
    issue_number,
    pr_number: c.pr_number,
    detection_method: DetectionMethod::DeepLinkFinder,
    final_confidence: confidence,
    link_quality: policy::deep_link_quality(rank, top, runner_up, t),
    confidence_breakdown: ConfidenceBreakdown {
      base_confidence: t.confidence_floor,
      ..ConfidenceBreakdown::default()
    },
    evidence_sources: DEEP_EVIDENCE_SOURCES.iter().map(|s| s.to_string()).collect(),
    comprehensive_rationale: deep_rationale(c, classification, confidence, proximity, &temporal_analysis, rank, ranked.len()),
    semantic_analysis: Some(c.semantic_scores.clone()),
    temporal_analysis,
    flags: LinkFlags {
      needs_manual_review: classification.low_classification_confidence,
      reverse_temporal: reversed,
    },
  }
}

/// Apply the decision rules to candidates already sorted best first.
pub fn decide(
  issue: &IssueData,
  classification: &BugClassificationResult,
  ranked: &[CandidatePr],
  analyzed_at: DateTime<Utc>,
) -> Decision {
  let t = DecisionThresholds::default();
  let v = Verdict {
    issue,
    classification,
    analyzed_at,
  };

  let Some(top) = ranked.first() else {
    return Decision::NoLink(v.no_link(NoLinkReason::NoTemporalMatches, 0, 0.0, None));
  };
  let evaluated = ranked.len();
  let best = top.ranking_score;

  if classification.low_classification_confidence && best < t.weak_top_score {
    return Decision::NoLink(v.no_link(NoLinkReason::AmbiguousClassificationWeak, evaluated, best, None));
  }

  let top_proximity = policy::temporal_proximity(top.temporal_delta_seconds, top.window_used_days);
  if policy::safety_brake(top_proximity, &top.semantic_scores, &t) {
    tracing::debug!(issue = issue.number, pr = top.pr_number, top_proximity, "safety brake fired");
    return Decision::NoLink(v.no_link(
      NoLinkReason::TemporalCoincidence,
      evaluated,
      best,
      Some(SAFETY_BRAKE_REASON.to_string()),
    ));
  }

  let floor = policy::selection_floor(best, &t);
  let links: Vec<LinkOutput> = ranked
    .iter()
    .filter(|c| c.ranking_score >= floor)
    .take(t.max_links)
    .enumerate()
    .map(|(rank, c)| deep_link(issue.number, c, rank, ranked, classification, &t))
    .collect();

  if links.is_empty() {
    return Decision::NoLink(v.no_link(NoLinkReason::NoSemanticMatches, evaluated, best, None));
  }

  Decision::Link(links)
}
