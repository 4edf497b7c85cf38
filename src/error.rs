// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Typed error taxonomy for the staging store, the LLM client and the linking pipeline
// role: errors
// outputs: StoreError, LlmError, LinkError and the serializable ErrorKind used in run summaries
// invariants:
// - Configuration errors abort a batch before any issue is processed
// - Transient upstream errors fail a single issue and never turn into a NoLink verdict
// - Cancellation is reported as its own kind
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("staging store unavailable: {0}")]
  Unavailable(String),

  #[error("repository not found in staging store: {0}")]
  RepositoryNotFound(String),

  #[error("{kind} #{number} not found in staging store")]
  NotFound { kind: &'static str, number: u64 },

  #[error("malformed staged data: {0}")]
  Malformed(String),

  #[error("store query cancelled")]
  Cancelled,
}

impl From<serde_json::Error> for StoreError {
  fn from(err: serde_json::Error) -> Self {
    StoreError::Malformed(err.to_string())
  }
}

#[derive(Debug, Error)]
pub enum LlmError {
  #[error("LLM client not enabled (no API key configured)")]
  Disabled,

  #[error("LLM call timed out after {0:?}")]
  Timeout(Duration),

  #[error("LLM transport error: {0}")]
  Transport(String),

  #[error("LLM returned HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("invalid LLM response: {0}")]
  InvalidResponse(String),

  #[error("LLM call cancelled")]
  Cancelled,
}

impl From<serde_json::Error> for LlmError {
  fn from(err: serde_json::Error) -> Self {
    LlmError::InvalidResponse(err.to_string())
  }
}

/// Error taxonomy shared by run summaries and per-issue failure records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Configuration,
  TransientUpstream,
  Cancelled,
  Persistence,
}

#[derive(Debug, Error)]
pub enum LinkError {
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Llm(#[from] LlmError),

  #[error("failed to persist outcomes: {0}")]
  Persistence(String),

  #[error("run cancelled")]
  Cancelled,
}

impl LinkError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      LinkError::Configuration(_) => ErrorKind::Configuration,
      LinkError::Store(StoreError::Cancelled) | LinkError::Llm(LlmError::Cancelled) | LinkError::Cancelled => {
        ErrorKind::Cancelled
      }
      LinkError::Store(StoreError::Unavailable(_)) | LinkError::Store(StoreError::RepositoryNotFound(_)) => {
        ErrorKind::Configuration
      }
      LinkError::Llm(LlmError::Disabled) => ErrorKind::Configuration,
      LinkError::Store(_) | LinkError::Llm(_) => ErrorKind::TransientUpstream,
      LinkError::Persistence(_) => ErrorKind::Persistence,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.kind() == ErrorKind::Cancelled
  }
}

pub type LinkResult<T> = Result<T, LinkError>;
