use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::linking::orchestrator::DEFAULT_WORKERS;
use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use crate::llm::{discover_api_key, LlmConfig};
use crate::util;

#[derive(Parser, Debug)]
#[command(
    name = "issue-pr-linker",
    version,
    about = "Link closed GitHub issues to the pull requests that fixed them",
    long_about = None
)]
pub struct Cli {
  /// Repository to analyze, as owner/name
  #[arg(long)]
  pub repo: Option<String>,

  /// Trailing window in days for lead-time metrics (0 = all history)
  #[arg(long, default_value_t = 90)]
  pub days: u32,

  /// Analyze and print the summary without persisting the report
  #[arg(long)]
  pub dry_run: bool,

  /// Staged snapshot JSON (repository, pull_requests, issues, timeline_events)
  #[arg(long, env = "LINKER_SNAPSHOT")]
  pub snapshot: Option<String>,

  /// Report destination: file path, or "-" for stdout
  #[arg(long, default_value = "-")]
  pub out: String,

  /// Issues evaluated concurrently
  #[arg(long, env = "LINKER_WORKERS", default_value_t = DEFAULT_WORKERS)]
  pub workers: usize,

  /// Chat-completions model
  #[arg(long, env = "LINKER_LLM_MODEL", default_value = DEFAULT_MODEL)]
  pub llm_model: String,

  /// OpenAI-compatible API base URL
  #[arg(long, env = "LINKER_LLM_BASE_URL", default_value = DEFAULT_BASE_URL)]
  pub llm_base_url: String,

  /// Per-call LLM timeout in seconds
  #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
  pub llm_timeout_secs: u64,

  /// Emit logs as JSON lines on stderr
  #[arg(long)]
  pub log_json: bool,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  /// Override the run clock (hidden; tests only)
  #[arg(long = "now-override", hide = true)]
  pub now_override: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EffectiveConfig {
  pub repo: String,
  pub days: u32,
  pub dry_run: bool,
  pub snapshot: String, // absolute path for stable diagnostics
  pub out: String,
  pub workers: usize,
  pub llm_model: String,
  pub llm_base_url: String,
  pub llm_timeout_secs: u64,
  pub log_json: bool,
  pub now_override: Option<String>,
}

impl EffectiveConfig {
  /// LLM settings; the API key comes from the environment, never from flags.
  pub fn llm_config(&self) -> LlmConfig {
    LlmConfig {
      api_key: discover_api_key(),
      model: self.llm_model.clone(),
      base_url: self.llm_base_url.clone(),
      timeout: Duration::from_secs(self.llm_timeout_secs),
    }
  }
}

fn valid_repo_name(repo: &str) -> bool {
  let mut parts = repo.split('/');
  matches!(
    (parts.next(), parts.next(), parts.next()),
    (Some(owner), Some(name), None) if !owner.trim().is_empty() && !name.trim().is_empty()
  )
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  let Some(raw_repo) = cli.repo.as_deref() else {
    bail!("Provide --repo <owner/name>");
  };
  let repo = raw_repo.trim().to_string();
  if !valid_repo_name(&repo) {
    bail!("Invalid --repo '{}': expected owner/name", raw_repo);
  }

  let Some(snapshot) = cli.snapshot.as_deref().filter(|s| !s.trim().is_empty()) else {
    bail!("Provide --snapshot <path> (or LINKER_SNAPSHOT) pointing at the staged repository data");
  };

  if cli.workers == 0 {
    bail!("--workers must be at least 1");
  }
  if cli.llm_timeout_secs == 0 {
    bail!("--llm-timeout-secs must be at least 1");
  }

  Ok(EffectiveConfig {
    repo,
    days: cli.days,
    dry_run: cli.dry_run,
    snapshot: util::canonicalize_lossy(snapshot),
    out: cli.out,
    workers: cli.workers,
    llm_model: cli.llm_model,
    llm_base_url: cli.llm_base_url,
    llm_timeout_secs: cli.llm_timeout_secs,
    log_json: cli.log_json,
    now_override: cli.now_override,
  })
}
