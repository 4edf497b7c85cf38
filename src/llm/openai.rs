// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: OpenAI-compatible chat-completions client in JSON mode with a per-call timeout
// role: llm/http
// inputs: LlmConfig (api key, model, base url, timeout); system and user prompts
// outputs: Message content of the first choice (raw JSON text)
// side_effects: One blocking HTTPS request per call
// invariants:
// - temperature 0 and response_format json_object on every call
// - Timeouts surface as LlmError::Timeout, never as an empty answer
// errors: Status codes carry a clipped body; transport failures carry the ureq message
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::{Duration, Instant};

use super::{ensure_active, LlmClient};
use crate::cancel::CancelToken;
use crate::error::LlmError;
use crate::ext::serde_json::JsonFetch;
use crate::util::truncate_chars;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct LlmConfig {
  pub api_key: Option<String>,
  pub model: String,
  pub base_url: String,
  pub timeout: Duration,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      api_key: discover_api_key(),
      model: DEFAULT_MODEL.to_string(),
      base_url: DEFAULT_BASE_URL.to_string(),
      timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
  }
}

/// Discover an API key: LINKER_LLM_API_KEY first, then OPENAI_API_KEY.
pub fn discover_api_key() -> Option<String> {
  for var in ["LINKER_LLM_API_KEY", "OPENAI_API_KEY"] {
    if let Ok(k) = std::env::var(var) {
      if !k.trim().is_empty() {
        return Some(k.trim().to_string());
      }
    }
  }

  None
}

pub struct OpenAiClient {
  agent: ureq::Agent,
  api_key: String,
  model: String,
  endpoint: String,
  timeout: Duration,
}

impl OpenAiClient {
  /// Returns None when no API key is configured.
  pub fn new(cfg: LlmConfig) -> Option<Self> {
    let api_key = cfg.api_key.filter(|k| !k.trim().is_empty())?;
    let agent = ureq::AgentBuilder::new()
      .timeout(cfg.timeout)
      .user_agent("issue-pr-linker")
      .build();

    Some(Self {
      agent,
      api_key,
      model: cfg.model,
      endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
      timeout: cfg.timeout,
    })
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }
}

fn is_timeout(t: &ureq::Transport) -> bool {
  use std::error::Error as _;

  if let Some(io) = t.source().and_then(|s| s.downcast_ref::<std::io::Error>()) {
    return matches!(io.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock);
  }

  t.to_string().contains("timed out")
}

impl LlmClient for OpenAiClient {
  fn is_enabled(&self) -> bool {
    true
  }

  fn complete_json(&self, cancel: &CancelToken, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
    ensure_active(cancel)?;

    let body = serde_json::json!({
      "model": self.model,
      "temperature": 0,
      "response_format": { "type": "json_object" },
      "messages": [
        { "role": "system", "content": system_prompt },
        { "role": "user", "content": user_prompt },
      ],
    });

    let started = Instant::now();
    let resp = self
      .agent
      .post(&self.endpoint)
      .set("Authorization", &format!("Bearer {}", self.api_key))
      .set("Content-Type", "application/json")
      .send_json(body);

    // The request cannot be interrupted mid-flight; drop its result if the caller gave up.
    ensure_active(cancel)?;

    let value: serde_json::Value = match resp {
      Ok(r) => r.into_json().map_err(|e| match e.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => LlmError::Timeout(self.timeout),
        _ => LlmError::InvalidResponse(e.to_string()),
      })?,
      Err(ureq::Error::Status(status, r)) => {
        let text = r.into_string().unwrap_or_default();
        return Err(LlmError::Status {
          status,
          body: truncate_chars(&text, 300).to_string(),
        });
      }
      Err(ureq::Error::Transport(t)) => {
        if is_timeout(&t) {
          return Err(LlmError::Timeout(self.timeout));
        }
        return Err(LlmError::Transport(t.to_string()));
      }
    };

    tracing::debug!(
      model = %self.model,
      elapsed_ms = started.elapsed().as_millis() as u64,
      total_tokens = value.fetch("usage.total_tokens").to::<u64>().unwrap_or(0),
      "llm completion"
    );

    value
      .fetch("choices.0.message.content")
      .to::<String>()
      .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".into()))
  }
}
