// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Define the value objects of the linking pipeline (staged inputs, intermediate evidence, terminal outcomes, run report)
// role: model/types
// outputs: Serializable structs/enums with stable snake_case field names consumed by the downstream quality scorer
// invariants:
// - Values are built once per run and never mutated after construction
// - detection_method, final_confidence and evidence_sources keep their shape (downstream contract)
// - Timestamps serialize as RFC 3339 UTC
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

pub type RepoId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
  pub id: RepoId,
  pub full_name: String,
}

// --- Staged inputs ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub author: String,
  #[serde(default)]
  pub author_role: String,
  #[serde(default)]
  pub body: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueData {
  pub number: u64,
  pub title: String,
  #[serde(default)]
  pub body: String,
  pub state: String,
  #[serde(default)]
  pub labels: Vec<String>,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub closed_at: Option<DateTime<Utc>>,
  /// Ordered oldest first.
  #[serde(default)]
  pub comments: Vec<Comment>,
}

impl IssueData {
  /// The last comment of the thread, which usually carries the closing rationale.
  pub fn closing_comment(&self) -> Option<&Comment> {
    self.comments.last()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestData {
  pub number: u64,
  pub title: String,
  #[serde(default)]
  pub body: String,
  pub state: String,
  #[serde(default)]
  pub merged: bool,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub merged_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub comments: Vec<String>,
  #[serde(default)]
  pub files: Vec<String>,
}

impl PullRequestData {
  /// Merge instant for PRs that actually landed.
  pub fn merged_instant(&self) -> Option<DateTime<Utc>> {
    if self.merged {
      self.merged_at
    } else {
      None
    }
  }
}

/// A staged issue timeline event. Only `cross-referenced` events sourced from
/// pull requests carry linking evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
  pub issue_number: u64,
  pub event_type: String,
  pub source_type: String,
  pub source_number: u64,
  #[serde(default)]
  pub source_title: String,
  #[serde(default)]
  pub source_body: String,
  pub created_at: DateTime<Utc>,
}

impl TimelineEvent {
  pub fn is_pull_request_cross_reference(&self) -> bool {
    self.event_type == "cross-referenced" && matches!(self.source_type.as_str(), "pull_request" | "PullRequest")
  }
}

// --- Evidence ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
  Fixes,
  Addresses,
  For,
  Mentions,
  Other,
}

impl ReferenceType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ReferenceType::Fixes => "fixes",
      ReferenceType::Addresses => "addresses",
      ReferenceType::For => "for",
      ReferenceType::Mentions => "mentions",
      ReferenceType::Other => "other",
    }
  }

  /// Lenient parse used for LLM-provided labels; unknown labels map to `Other`.
  pub fn from_label(label: &str) -> Self {
    match label.trim().to_ascii_lowercase().as_str() {
      "fixes" | "fix" | "closes" | "resolves" => ReferenceType::Fixes,
      "addresses" | "address" => ReferenceType::Addresses,
      "for" => ReferenceType::For,
      "mentions" | "mention" => ReferenceType::Mentions,
      _ => ReferenceType::Other,
    }
  }
}

impl fmt::Display for ReferenceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineLink {
  pub issue_number: u64,
  pub pr_number: u64,
  pub reference_type: ReferenceType,
  pub extracted_text: String,
  pub base_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceLocation {
  PrTitle,
  PrDescription,
  PrComment,
  TimelineApi,
}

impl ReferenceLocation {
  pub fn as_str(&self) -> &'static str {
    match self {
      ReferenceLocation::PrTitle => "pr_title",
      ReferenceLocation::PrDescription => "pr_description",
      ReferenceLocation::PrComment => "pr_comment",
      ReferenceLocation::TimelineApi => "timeline_api",
    }
  }

  pub fn from_label(label: &str) -> Self {
    match label.trim().to_ascii_lowercase().as_str() {
      "pr_title" | "title" => ReferenceLocation::PrTitle,
      "pr_comment" | "comment" => ReferenceLocation::PrComment,
      "timeline_api" => ReferenceLocation::TimelineApi,
      _ => ReferenceLocation::PrDescription,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
  GithubTimelineVerified,
  Explicit,
  ExplicitBidirectional,
  DeepLinkFinder,
}

impl DetectionMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      DetectionMethod::GithubTimelineVerified => "github_timeline_verified",
      DetectionMethod::Explicit => "explicit",
      DetectionMethod::ExplicitBidirectional => "explicit_bidirectional",
      DetectionMethod::DeepLinkFinder => "deep_link_finder",
    }
  }
}

impl fmt::Display for DetectionMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplicitReference {
  pub issue_number: u64,
  pub pr_number: u64,
  pub reference_type: ReferenceType,
  pub reference_location: ReferenceLocation,
  pub extracted_text: String,
  pub base_confidence: f64,
  pub detection_method: DetectionMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoraMetrics {
  pub median_lead_time_hours: f64,
  pub sample_size: usize,
  pub insufficient_history: bool,
  pub cross_reference_links_found: usize,
  /// Trailing window the metrics were computed over (0 = all history).
  pub computed_over_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalDirection {
  Normal,
  Reverse,
}

impl TemporalDirection {
  /// Direction of a signed `issue_closed_at - pr_merged_at` delta.
  pub fn from_delta(delta_seconds: i64) -> Self {
    if delta_seconds < 0 {
      TemporalDirection::Reverse
    } else {
      TemporalDirection::Normal
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      TemporalDirection::Normal => "normal",
      TemporalDirection::Reverse => "reverse",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticScores {
  pub title_score: f64,
  pub body_score: f64,
  pub comment_score: f64,
  #[serde(default)]
  pub cross_content_score: f64,
  #[serde(default)]
  pub file_context_score: f64,
  #[serde(default)]
  pub title_keywords: Vec<String>,
  #[serde(default)]
  pub body_keywords: Vec<String>,
  #[serde(default)]
  pub comment_keywords: Vec<String>,
  #[serde(default)]
  pub title_rationale: String,
  #[serde(default)]
  pub body_rationale: String,
  #[serde(default)]
  pub comment_rationale: String,
  #[serde(default)]
  pub cross_content_rationale: String,
}

impl SemanticScores {
  /// Strongest textual dimension (title, body, comment, cross-content).
  pub fn max_score(&self) -> f64 {
    self
      .title_score
      .max(self.body_score)
      .max(self.comment_score)
      .max(self.cross_content_score)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePr {
  pub pr_number: u64,
  pub title: String,
  pub description: String,
  pub comments: Vec<String>,
  pub files: Vec<String>,
  pub merged_at: DateTime<Utc>,
  /// Signed `issue_closed_at - pr_merged_at`; negative when the PR merged after the close.
  pub temporal_delta_seconds: i64,
  pub temporal_direction: TemporalDirection,
  pub window_used_days: f64,
  pub semantic_scores: SemanticScores,
  pub ranking_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureClassification {
  FixedWithCode,
  NotABug,
  Duplicate,
  Wontfix,
  UserActionRequired,
  Unclear,
}

impl ClosureClassification {
  pub fn as_str(&self) -> &'static str {
    match self {
      ClosureClassification::FixedWithCode => "fixed_with_code",
      ClosureClassification::NotABug => "not_a_bug",
      ClosureClassification::Duplicate => "duplicate",
      ClosureClassification::Wontfix => "wontfix",
      ClosureClassification::UserActionRequired => "user_action_required",
      ClosureClassification::Unclear => "unclear",
    }
  }
}

impl fmt::Display for ClosureClassification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugClassificationResult {
  pub issue_number: u64,
  pub closure_classification: ClosureClassification,
  pub classification_confidence: f64,
  pub classification_rationale: String,
  pub conversation_summary: String,
  #[serde(default)]
  pub key_decision_snippets: Vec<String>,
  pub low_classification_confidence: bool,
}

// --- Terminal outputs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkQuality {
  High,
  Medium,
  Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPattern {
  Normal,
  Reverse,
  Simultaneous,
  Delayed,
}

impl TemporalPattern {
  pub fn as_str(&self) -> &'static str {
    match self {
      TemporalPattern::Normal => "normal",
      TemporalPattern::Reverse => "reverse",
      TemporalPattern::Simultaneous => "simultaneous",
      TemporalPattern::Delayed => "delayed",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalAnalysis {
  pub issue_closed_at: DateTime<Utc>,
  pub pr_merged_at: DateTime<Utc>,
  pub delta_seconds: i64,
  pub pattern: TemporalPattern,
  pub direction: TemporalDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
  pub base_confidence: f64,
  pub bidirectional_boost: f64,
  pub semantic_boost: f64,
  pub temporal_boost: f64,
  pub negative_signal_penalty: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFlags {
  pub needs_manual_review: bool,
  pub reverse_temporal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkOutput {
  pub issue_number: u64,
  pub pr_number: u64,
  pub detection_method: DetectionMethod,
  pub final_confidence: f64,
  pub link_quality: LinkQuality,
  pub confidence_breakdown: ConfidenceBreakdown,
  pub evidence_sources: Vec<String>,
  pub comprehensive_rationale: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub semantic_analysis: Option<SemanticScores>,
  pub temporal_analysis: TemporalAnalysis,
  pub flags: LinkFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoLinkReason {
  NoTemporalMatches,
  AmbiguousClassificationWeak,
  TemporalCoincidence,
  NoSemanticMatches,
  NotABug,
  Duplicate,
  Wontfix,
  UserActionRequired,
  Unclear,
}

impl NoLinkReason {
  /// Reason for a closure type that closes the gate before any candidate search.
  pub fn from_closure(classification: ClosureClassification) -> Option<Self> {
    match classification {
      ClosureClassification::NotABug => Some(NoLinkReason::NotABug),
      ClosureClassification::Duplicate => Some(NoLinkReason::Duplicate),
      ClosureClassification::Wontfix => Some(NoLinkReason::Wontfix),
      ClosureClassification::UserActionRequired => Some(NoLinkReason::UserActionRequired),
      ClosureClassification::Unclear => Some(NoLinkReason::Unclear),
      ClosureClassification::FixedWithCode => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      NoLinkReason::NoTemporalMatches => "no_temporal_matches",
      NoLinkReason::AmbiguousClassificationWeak => "ambiguous_classification_weak",
      NoLinkReason::TemporalCoincidence => "temporal_coincidence",
      NoLinkReason::NoSemanticMatches => "no_semantic_matches",
      NoLinkReason::NotABug => "not_a_bug",
      NoLinkReason::Duplicate => "duplicate",
      NoLinkReason::Wontfix => "wontfix",
      NoLinkReason::UserActionRequired => "user_action_required",
      NoLinkReason::Unclear => "unclear",
    }
  }
}

impl fmt::Display for NoLinkReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoLinkOutput {
  pub issue_number: u64,
  pub reason: NoLinkReason,
  pub classification: ClosureClassification,
  pub classification_confidence: f64,
  pub classification_rationale: String,
  pub conversation_summary: String,
  pub candidates_evaluated: usize,
  pub best_candidate_score: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub safety_brake_reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub issue_closed_at: Option<DateTime<Utc>>,
  pub analyzed_at: DateTime<Utc>,
}

// --- Per-issue outcome and run report ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPath {
  /// Explicit or timeline-verified references validated by the explicit link validator.
  Explicit,
  /// Inferred via classification, temporal candidates and semantic ranking.
  Deep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedIssue {
  pub issue_number: u64,
  pub kind: ErrorKind,
  pub message: String,
}

/// Exactly one terminal state per issue. `Failed` is never a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IssueOutcome {
  Linked {
    issue_number: u64,
    path: LinkPath,
    links: Vec<LinkOutput>,
  },
  NoLink(NoLinkOutput),
  Failed(FailedIssue),
}

impl IssueOutcome {
  pub fn issue_number(&self) -> u64 {
    match self {
      IssueOutcome::Linked { issue_number, .. } => *issue_number,
      IssueOutcome::NoLink(n) => n.issue_number,
      IssueOutcome::Failed(f) => f.issue_number,
    }
  }

  pub fn links(&self) -> &[LinkOutput] {
    match self {
      IssueOutcome::Linked { links, .. } => links,
      _ => &[],
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, IssueOutcome::Failed(_))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
  pub total_issues: usize,
  pub path_a: usize,
  pub path_b: usize,
  pub links_created: usize,
  pub no_links: usize,
  pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
  pub repository: String,
  pub days: u32,
  pub dry_run: bool,
  pub analyzed_at: DateTime<Utc>,
  pub dora: DoraMetrics,
  pub timeline_links_found: usize,
  pub explicit_references_found: usize,
  /// PR numbers of explicit-extraction batches whose LLM call failed.
  pub failed_explicit_batches: Vec<Vec<u64>>,
  pub stats: RunStats,
  /// Issues to re-run: evaluation failed, no verdict was produced.
  pub failed_issues: Vec<u64>,
  /// PRs linked to more than one issue.
  pub shared_prs: Vec<u64>,
  pub outcomes: Vec<IssueOutcome>,
}
