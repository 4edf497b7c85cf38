// Shared helpers for the integration suite: CLI invocation with fixture env, and
// in-process doubles for library-level scenarios.
#![allow(dead_code)]

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use issue_pr_linker::cancel::CancelToken;
use issue_pr_linker::error::LlmError;
use issue_pr_linker::llm::{LlmClient, PromptKind};
use issue_pr_linker::model::{Comment, IssueData, PullRequestData, Repository, TimelineEvent};
use issue_pr_linker::staging::{Snapshot, SnapshotStore};

pub const BIN: &str = "issue-pr-linker";
pub const NOW: &str = "2025-03-01T00:00:00Z";

const LLM_ENV: [&str; 4] = [
  "LINKER_TEST_LLM_EXTRACT_JSON",
  "LINKER_TEST_LLM_CLASSIFY_JSON",
  "LINKER_TEST_LLM_RANK_JSON",
  "LINKER_TEST_LLM_SEMANTIC_JSON",
];

/// Binary with a clean environment: no credentials, no inherited fixtures.
pub fn bare_cmd() -> assert_cmd::Command {
  let mut cmd = test_support::cmd_bin(BIN);
  for k in LLM_ENV {
    cmd.env_remove(k);
  }
  cmd
    .env_remove("LINKER_LLM_API_KEY")
    .env_remove("OPENAI_API_KEY")
    .env_remove("LINKER_SNAPSHOT")
    .env_remove("LINKER_WORKERS")
    .env("RUST_LOG", "warn");
  cmd
}

/// Binary with LLM fixtures and a pinned clock, but no repository or snapshot.
pub fn fixture_cmd(classify_fixture: &str) -> assert_cmd::Command {
  let mut cmd = bare_cmd();
  cmd
    .env("LINKER_TEST_LLM_CLASSIFY_JSON", test_support::read_fixture_text(classify_fixture))
    .env("LINKER_TEST_LLM_RANK_JSON", test_support::read_fixture_text("llm/rank.json"))
    .env("LINKER_TEST_LLM_SEMANTIC_JSON", test_support::read_fixture_text("llm/semantic.json"))
    .args(["--days", "0", "--now-override", NOW]);
  cmd
}

/// Binary wired to the widgets snapshot with the given classification fixture.
pub fn linker_cmd(classify_fixture: &str) -> assert_cmd::Command {
  let mut cmd = fixture_cmd(classify_fixture);
  cmd
    .args(["--repo", "acme/widgets", "--snapshot"])
    .arg(test_support::fixture_path("snapshot_widgets.json"));
  cmd
}

/// Run the binary with `--out <file>` and return the parsed report.
pub fn run_to_file(cmd: &mut assert_cmd::Command, dir: &std::path::Path) -> serde_json::Value {
  let out = dir.join("report.json");
  cmd.arg("--out").arg(&out).assert().success();
  let data = std::fs::read(&out).expect("report file");
  serde_json::from_slice(&data).expect("report JSON")
}

// --- In-process doubles ---

pub fn ts(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s).expect("timestamp").with_timezone(&Utc)
}

pub fn hours(h: i64) -> Duration {
  Duration::hours(h)
}

pub fn closed_issue(number: u64, title: &str, closed_at: DateTime<Utc>, closing_comment: &str) -> IssueData {
  IssueData {
    number,
    title: title.to_string(),
    body: format!("Report for {title}"),
    state: "closed".to_string(),
    labels: vec!["bug".to_string()],
    created_at: closed_at - Duration::days(3),
    closed_at: Some(closed_at),
    comments: vec![Comment {
      author: "maintainer".to_string(),
      author_role: "MEMBER".to_string(),
      body: closing_comment.to_string(),
      created_at: closed_at,
    }],
  }
}

pub fn pr(number: u64, title: &str, body: &str, merged_at: DateTime<Utc>) -> PullRequestData {
  PullRequestData {
    number,
    title: title.to_string(),
    body: body.to_string(),
    state: "closed".to_string(),
    merged: true,
    created_at: merged_at - Duration::hours(20),
    merged_at: Some(merged_at),
    comments: vec![],
    files: vec![],
  }
}

pub fn store(issues: Vec<IssueData>, pull_requests: Vec<PullRequestData>, timeline_events: Vec<TimelineEvent>) -> SnapshotStore {
  SnapshotStore::from_snapshot(Snapshot {
    repository: Repository {
      id: 7,
      full_name: "acme/widgets".to_string(),
    },
    pull_requests,
    issues,
    timeline_events,
  })
}

pub fn classification(category: &str, confidence: f64) -> String {
  serde_json::json!({
    "closure_classification": category,
    "classification_confidence": confidence,
    "classification_rationale": format!("thread reads as {category}"),
    "conversation_summary": "summary",
    "key_decision_snippets": [],
  })
  .to_string()
}

/// `(pr, title, body, comment)` scores; file context is 0.
pub fn rankings(entries: &[(u64, f64, f64, f64)]) -> String {
  let rows: Vec<serde_json::Value> = entries
    .iter()
    .map(|(pr, t, b, c)| {
      serde_json::json!({
        "pr_number": pr,
        "title_score": t,
        "body_score": b,
        "comment_score": c,
        "file_context_score": 0.0,
      })
    })
    .collect();
  serde_json::json!({ "rankings": rows }).to_string()
}

type Answer = dyn Fn(PromptKind, &str) -> Result<String, LlmError> + Send + Sync;

/// LLM double answering through a closure; records every (task, user prompt).
pub struct FakeLlm {
  answer: Box<Answer>,
  log: Mutex<Vec<(PromptKind, String)>>,
}

impl FakeLlm {
  pub fn new<F>(answer: F) -> Self
  where
    F: Fn(PromptKind, &str) -> Result<String, LlmError> + Send + Sync + 'static,
  {
    Self {
      answer: Box::new(answer),
      log: Mutex::new(Vec::new()),
    }
  }

  pub fn calls(&self, kind: PromptKind) -> usize {
    self.log.lock().unwrap().iter().filter(|(k, _)| *k == kind).count()
  }
}

impl LlmClient for FakeLlm {
  fn is_enabled(&self) -> bool {
    true
  }

  fn complete_json(&self, cancel: &CancelToken, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
    if cancel.is_cancelled() {
      return Err(LlmError::Cancelled);
    }
    let kind = PromptKind::detect(system_prompt).expect("known prompt");
    self.log.lock().unwrap().push((kind, user_prompt.to_string()));
    (self.answer)(kind, user_prompt)
  }
}
