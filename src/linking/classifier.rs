// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Classify why an issue was closed from its whole conversation and gate the deep link finder
// role: linking/classifier
// inputs: IssueData (title, body, ordered comments); LlmClient
// outputs: BugClassificationResult; gate decision
// side_effects: One LLM call per issue
// invariants:
// - Comments over 2000 chars are sent as first 1000 + "...[truncated]..." + last 500 chars
// - Confidence is clamped to [0,1]; low confidence means <= 0.70
// - Unknown categories are invalid responses, never coerced to "unclear"
// errors: LlmError (disabled, transport, timeout, invalid response)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::fmt::Write as _;

use serde::Deserialize;

use super::policy;
use crate::cancel::CancelToken;
use crate::error::LlmError;
use crate::llm::{parse_json_response, LlmClient, PromptKind};
use crate::model::{BugClassificationResult, ClosureClassification, IssueData};
use crate::util::{head_tail, iso_utc};

pub const COMMENT_TRUNCATE_THRESHOLD: usize = 2000;
const COMMENT_HEAD_CHARS: usize = 1000;
const COMMENT_TAIL_CHARS: usize = 500;
const TRUNCATION_MARKER: &str = "...[truncated]...";

pub fn truncate_comment(body: &str) -> String {
  if body.chars().count() <= COMMENT_TRUNCATE_THRESHOLD {
    return body.to_string();
  }

  head_tail(body, COMMENT_HEAD_CHARS, COMMENT_TAIL_CHARS, TRUNCATION_MARKER)
}

pub fn build_classification_prompt(issue: &IssueData) -> String {
  let mut p = String::new();
  let _ = writeln!(p, "ISSUE #{}: {}", issue.number, issue.title);
  if let Some(closed) = &issue.closed_at {
    let _ = writeln!(p, "Closed at: {}", iso_utc(closed));
  }
  if !issue.labels.is_empty() {
    let _ = writeln!(p, "Labels: {}", issue.labels.join(", "));
  }
  let _ = writeln!(p, "\nDESCRIPTION:\n{}", issue.body.trim());

  let _ = writeln!(p, "\nCOMMENTS ({}):", issue.comments.len());
  for (i, c) in issue.comments.iter().enumerate() {
    let role = if c.author_role.is_empty() { "NONE" } else { c.author_role.as_str() };
    let _ = writeln!(
      p,
      "[{}] {} ({}) at {}:\n{}\n",
      i + 1,
      c.author,
      role,
      iso_utc(&c.created_at),
      truncate_comment(&c.body)
    );
  }

  p
}

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
  closure_classification: String,
  #[serde(default)]
  classification_confidence: f64,
  #[serde(default)]
  classification_rationale: String,
  #[serde(default)]
  conversation_summary: String,
  #[serde(default)]
  key_decision_snippets: Vec<String>,
}

fn parse_category(label: &str) -> Option<ClosureClassification> {
  match label.trim().to_ascii_lowercase().as_str() {
    "fixed_with_code" => Some(ClosureClassification::FixedWithCode),
    "not_a_bug" => Some(ClosureClassification::NotABug),
    "duplicate" => Some(ClosureClassification::Duplicate),
    "wontfix" => Some(ClosureClassification::Wontfix),
    "user_action_required" => Some(ClosureClassification::UserActionRequired),
    "unclear" => Some(ClosureClassification::Unclear),
    _ => None,
  }
}

pub fn parse_classification(raw: &str, issue_number: u64) -> Result<BugClassificationResult, LlmError> {
  let resp: ClassificationResponse = parse_json_response(raw)?;
  let closure_classification = parse_category(&resp.closure_classification).ok_or_else(|| {
    LlmError::InvalidResponse(format!("unknown closure_classification '{}'", resp.closure_classification))
  })?;
  let classification_confidence = policy::unit_score(resp.classification_confidence);

  Ok(BugClassificationResult {
    issue_number,
    closure_classification,
    classification_confidence,
    classification_rationale: resp.classification_rationale,
    conversation_summary: resp.conversation_summary,
    key_decision_snippets: resp.key_decision_snippets,
    low_classification_confidence: policy::is_low_classification_confidence(classification_confidence),
  })
}

pub fn classify_closure(
  llm: &dyn LlmClient,
  cancel: &CancelToken,
  issue: &IssueData,
) -> Result<BugClassificationResult, LlmError> {
  let prompt = build_classification_prompt(issue);
  let raw = llm.complete_json(cancel, PromptKind::ClosureClassification.system_prompt(), &prompt)?;
  let result = parse_classification(&raw, issue.number)?;

  tracing::debug!(
    issue = issue.number,
    classification = %result.closure_classification,
    confidence = result.classification_confidence,
    "classified closure"
  );

  Ok(result)
}

/// Whether the deep link finder should look for a fixing PR.
pub fn should_proceed_to_deep_finder(result: &BugClassificationResult) -> bool {
  match result.closure_classification {
    ClosureClassification::FixedWithCode => true,
    ClosureClassification::Unclear => !result.low_classification_confidence,
    ClosureClassification::NotABug
    | ClosureClassification::Duplicate
    | ClosureClassification::Wontfix
    | ClosureClassification::UserActionRequired => false,
  }
}
