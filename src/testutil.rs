// Test doubles shared by unit tests: snapshot builders, a scripted LLM and a call-counting store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::cancel::CancelToken;
use crate::error::{LlmError, StoreError};
use crate::llm::{LlmClient, PromptKind};
use crate::model::{Comment, IssueData, PullRequestData, RepoId, Repository, TimelineEvent};
use crate::staging::{Snapshot, SnapshotStore, StagingStore};

pub const REPO_ID: RepoId = 1;
pub const REPO: &str = "acme/widgets";

pub fn ts(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s)
    .map(|d| d.with_timezone(&Utc))
    .unwrap_or_else(|e| panic!("bad timestamp {s}: {e}"))
}

pub fn hours(h: f64) -> chrono::Duration {
  chrono::Duration::seconds((h * 3600.0).round() as i64)
}

pub fn issue(number: u64, title: &str, closed_at: Option<DateTime<Utc>>) -> IssueData {
  IssueData {
    number,
    title: title.to_string(),
    body: String::new(),
    state: if closed_at.is_some() { "closed" } else { "open" }.to_string(),
    labels: vec![],
    created_at: ts("2025-01-01T00:00:00Z"),
    closed_at,
    comments: vec![],
  }
}

pub fn comment(author: &str, body: &str, at: DateTime<Utc>) -> Comment {
  Comment {
    author: author.to_string(),
    author_role: "MEMBER".to_string(),
    body: body.to_string(),
    created_at: at,
  }
}

pub fn merged_pr(number: u64, title: &str, created_at: DateTime<Utc>, merged_at: DateTime<Utc>) -> PullRequestData {
  PullRequestData {
    number,
    title: title.to_string(),
    body: String::new(),
    state: "closed".to_string(),
    merged: true,
    created_at,
    merged_at: Some(merged_at),
    comments: vec![],
    files: vec![],
  }
}

pub fn cross_reference(issue_number: u64, pr: &PullRequestData, at: DateTime<Utc>) -> TimelineEvent {
  TimelineEvent {
    issue_number,
    event_type: "cross-referenced".to_string(),
    source_type: "pull_request".to_string(),
    source_number: pr.number,
    source_title: pr.title.clone(),
    source_body: pr.body.clone(),
    created_at: at,
  }
}

pub fn store(issues: Vec<IssueData>, pull_requests: Vec<PullRequestData>, timeline_events: Vec<TimelineEvent>) -> SnapshotStore {
  SnapshotStore::from_snapshot(Snapshot {
    repository: Repository {
      id: REPO_ID,
      full_name: REPO.to_string(),
    },
    pull_requests,
    issues,
    timeline_events,
  })
}

// --- Canned LLM payloads ---

pub fn classify_json(category: &str, confidence: f64) -> String {
  serde_json::json!({
    "closure_classification": category,
    "classification_confidence": confidence,
    "classification_rationale": format!("closed as {category}"),
    "conversation_summary": "summary",
    "key_decision_snippets": [],
  })
  .to_string()
}

/// One ranking entry per `(pr, title, body, comment)`; file context is 0.
pub fn rank_json(entries: &[(u64, f64, f64, f64)]) -> String {
  let rankings: Vec<serde_json::Value> = entries
    .iter()
    .map(|(pr, t, b, c)| {
      serde_json::json!({
        "pr_number": pr,
        "title_score": t,
        "body_score": b,
        "comment_score": c,
        "file_context_score": 0.0,
        "title_rationale": "title",
        "body_rationale": "body",
        "comment_rationale": "comment",
      })
    })
    .collect();
  serde_json::json!({ "rankings": rankings }).to_string()
}

pub fn semantic_json(title: f64, body: f64, comment: f64, cross: f64) -> String {
  serde_json::json!({
    "title_score": title,
    "body_score": body,
    "comment_score": comment,
    "cross_content_score": cross,
    "title_rationale": "t",
    "body_rationale": "b",
    "comment_rationale": "c",
    "cross_content_rationale": "x",
  })
  .to_string()
}

// --- Scripted LLM ---

type Responder = dyn Fn(PromptKind, &str) -> Result<String, LlmError> + Send + Sync;

/// LLM double answering through a closure and counting calls per task.
pub struct ScriptedLlm {
  respond: Box<Responder>,
  calls: Mutex<BTreeMap<&'static str, usize>>,
  prompts: Mutex<Vec<(PromptKind, String)>>,
}

impl ScriptedLlm {
  pub fn new<F>(respond: F) -> Self
  where
    F: Fn(PromptKind, &str) -> Result<String, LlmError> + Send + Sync + 'static,
  {
    Self {
      respond: Box::new(respond),
      calls: Mutex::new(BTreeMap::new()),
      prompts: Mutex::new(Vec::new()),
    }
  }

  pub fn calls(&self, kind: PromptKind) -> usize {
    self.calls.lock().map(|m| m.get(kind.label()).copied().unwrap_or(0)).unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().map(|m| m.values().sum()).unwrap_or(0)
  }

  /// User prompts sent for `kind`, in call order.
  pub fn prompts(&self, kind: PromptKind) -> Vec<String> {
    self
      .prompts
      .lock()
      .map(|p| p.iter().filter(|(k, _)| *k == kind).map(|(_, s)| s.clone()).collect())
      .unwrap_or_default()
  }
}

impl LlmClient for ScriptedLlm {
  fn is_enabled(&self) -> bool {
    true
  }

  fn complete_json(&self, cancel: &CancelToken, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
    if cancel.is_cancelled() {
      return Err(LlmError::Cancelled);
    }
    let kind = PromptKind::detect(system_prompt)
      .ok_or_else(|| LlmError::InvalidResponse("unknown prompt".into()))?;

    if let Ok(mut m) = self.calls.lock() {
      *m.entry(kind.label()).or_insert(0) += 1;
    }
    if let Ok(mut p) = self.prompts.lock() {
      p.push((kind, user_prompt.to_string()));
    }

    (self.respond)(kind, user_prompt)
  }
}

// --- Counting store ---

/// Wraps a store and counts candidate-window queries.
pub struct CountingStore<S> {
  inner: S,
  window_queries: AtomicUsize,
}

impl<S: StagingStore> CountingStore<S> {
  pub fn new(inner: S) -> Self {
    Self {
      inner,
      window_queries: AtomicUsize::new(0),
    }
  }

  pub fn window_queries(&self) -> usize {
    self.window_queries.load(Ordering::SeqCst)
  }
}

impl<S: StagingStore> StagingStore for CountingStore<S> {
  fn resolve_repository(&self, full_name: &str) -> Result<Repository, StoreError> {
    self.inner.resolve_repository(full_name)
  }

  fn merged_prs_between(
    &self,
    cancel: &CancelToken,
    repo: RepoId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
  ) -> Result<Vec<PullRequestData>, StoreError> {
    self.window_queries.fetch_add(1, Ordering::SeqCst);
    self.inner.merged_prs_between(cancel, repo, start, end)
  }

  fn merged_prs_since(
    &self,
    cancel: &CancelToken,
    repo: RepoId,
    cutoff: Option<DateTime<Utc>>,
  ) -> Result<Vec<PullRequestData>, StoreError> {
    self.inner.merged_prs_since(cancel, repo, cutoff)
  }

  fn closed_issue_numbers(&self, cancel: &CancelToken, repo: RepoId) -> Result<Vec<u64>, StoreError> {
    self.inner.closed_issue_numbers(cancel, repo)
  }

  fn issue(&self, cancel: &CancelToken, repo: RepoId, number: u64) -> Result<IssueData, StoreError> {
    self.inner.issue(cancel, repo, number)
  }

  fn pull_request(&self, cancel: &CancelToken, repo: RepoId, number: u64) -> Result<PullRequestData, StoreError> {
    self.inner.pull_request(cancel, repo, number)
  }

  fn cross_reference_events(&self, cancel: &CancelToken, repo: RepoId) -> Result<Vec<TimelineEvent>, StoreError> {
    self.inner.cross_reference_events(cancel, repo)
  }
}
