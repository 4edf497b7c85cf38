// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Pure numeric policy of the linker (adaptive window, composite score, safety brake, confidence and quality rules)
// role: linking/policy
// outputs: Scores, thresholds and categorical decisions computed from in-memory values (no IO)
// invariants:
// - Deterministic math; bounded outputs; no panics
// - Deep-link confidence stays in [0.50, 0.85]; explicit-link confidence stays in [0.0, 0.98]
// - Comparisons against thresholds are strict exactly where documented on each function
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use crate::model::{DoraMetrics, LinkQuality, SemanticScores, TemporalDirection, TemporalPattern};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Sample size under which DORA history is considered insufficient.
pub const MIN_DORA_SAMPLE: usize = 10;

/// Classification confidence at or below which a verdict is "low confidence".
pub const LOW_CLASSIFICATION_CONFIDENCE: f64 = 0.70;

/// Clamp a value to [lo, hi].
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
  v.max(lo).min(hi)
}

// --- Adaptive window ---

#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
  pub insufficient_history_hours: f64,
  pub lead_time_scale: f64,
  pub min_hours: f64,
  pub max_hours: f64,
}

impl Default for WindowPolicy {
  fn default() -> Self {
    Self {
      insufficient_history_hours: 72.0,
      lead_time_scale: 0.75,
      min_hours: 36.0,
      max_hours: 168.0,
    }
  }
}

/// Symmetric half-width of the candidate search window, in hours.
pub fn adaptive_window_hours(metrics: &DoraMetrics, p: &WindowPolicy) -> f64 {
  if metrics.insufficient_history {
    return p.insufficient_history_hours;
  }

  clamp(p.lead_time_scale * metrics.median_lead_time_hours, p.min_hours, p.max_hours)
}

pub fn is_insufficient_history(sample_size: usize) -> bool {
  sample_size < MIN_DORA_SAMPLE
}

pub fn is_low_classification_confidence(confidence: f64) -> bool {
  confidence <= LOW_CLASSIFICATION_CONFIDENCE
}

// --- Composite ranking score ---

#[derive(Debug, Clone, Copy)]
pub struct RankingWeights {
  pub temporal: f64,
  pub comment: f64,
  pub body: f64,
  pub title: f64,
  pub file_context: f64,
}

impl Default for RankingWeights {
  fn default() -> Self {
    Self {
      temporal: 0.30,
      comment: 0.30,
      body: 0.20,
      title: 0.15,
      file_context: 0.05,
    }
  }
}

/// `clamp(1 - |delta| / (window_days * 86400), 0, 1)`; zero for an empty window.
pub fn temporal_proximity(delta_seconds: i64, window_days: f64) -> f64 {
  let span = window_days * SECONDS_PER_DAY;
  if span <= 0.0 {
    return 0.0;
  }

  clamp(1.0 - (delta_seconds.unsigned_abs() as f64) / span, 0.0, 1.0)
}

/// Clamp an LLM-provided score into [0, 1]; NaN counts as 0.
pub fn unit_score(v: f64) -> f64 {
  if v.is_nan() {
    0.0
  } else {
    clamp(v, 0.0, 1.0)
  }
}

pub fn ranking_score(proximity: f64, scores: &SemanticScores, w: &RankingWeights) -> f64 {
  w.temporal * proximity
    + w.comment * scores.comment_score
    + w.body * scores.body_score
    + w.title * scores.title_score
    + w.file_context * scores.file_context_score
}

// --- Deep-link decision thresholds ---

#[derive(Debug, Clone, Copy)]
pub struct DecisionThresholds {
  /// Rule 2: low-confidence classification needs at least this top score.
  pub weak_top_score: f64,
  /// Rule 3: safety brake proximity ceiling (strict).
  pub brake_proximity: f64,
  /// Rule 3: safety brake semantic ceiling (strict, all three dimensions).
  pub brake_semantic: f64,
  /// Rule 4: absolute floor for a selected candidate.
  pub min_link_score: f64,
  /// Rule 4: candidates must be within this margin of the top score.
  pub top_margin: f64,
  pub max_links: usize,
  /// Top two candidates closer than this are a near tie.
  pub near_tie: f64,
  pub confidence_floor: f64,
  pub confidence_slope: f64,
  pub confidence_cap: f64,
  pub simultaneous_secs: i64,
  pub delayed_secs: i64,
}

impl Default for DecisionThresholds {
  fn default() -> Self {
    Self {
      weak_top_score: 0.70,
      brake_proximity: 0.20,
      brake_semantic: 0.50,
      min_link_score: 0.65,
      top_margin: 0.10,
      max_links: 3,
      near_tie: 0.03,
      confidence_floor: 0.50,
      confidence_slope: 0.35,
      confidence_cap: 0.85,
      simultaneous_secs: 300,
      delayed_secs: 86_400,
    }
  }
}

/// Fires iff proximity < 0.20 and title, body and comment are all < 0.50.
pub fn safety_brake(proximity: f64, scores: &SemanticScores, t: &DecisionThresholds) -> bool {
  proximity < t.brake_proximity
    && scores.title_score < t.brake_semantic
    && scores.body_score < t.brake_semantic
    && scores.comment_score < t.brake_semantic
}

/// Minimum ranking score for selection: `max(0.65, top - 0.10)`.
pub fn selection_floor(top_score: f64, t: &DecisionThresholds) -> f64 {
  t.min_link_score.max(top_score - t.top_margin)
}

/// `min(0.85, 0.50 + 0.35 * score)`, floored at 0.50.
pub fn deep_link_confidence(ranking_score: f64, t: &DecisionThresholds) -> f64 {
  clamp(
    t.confidence_floor + t.confidence_slope * ranking_score,
    t.confidence_floor,
    t.confidence_cap,
  )
}

/// Low when not the top pick or when the two best candidates nearly tie.
pub fn deep_link_quality(rank: usize, top_score: f64, runner_up: Option<f64>, t: &DecisionThresholds) -> LinkQuality {
  let near_tie = runner_up.is_some_and(|second| (top_score - second).abs() < t.near_tie);
  if rank > 0 || near_tie {
    LinkQuality::Low
  } else {
    LinkQuality::Medium
  }
}

pub fn deep_temporal_pattern(delta_seconds: i64, direction: TemporalDirection, t: &DecisionThresholds) -> TemporalPattern {
  let abs = delta_seconds.abs();
  if direction == TemporalDirection::Reverse {
    TemporalPattern::Reverse
  } else if abs < t.simultaneous_secs {
    TemporalPattern::Simultaneous
  } else if abs > t.delayed_secs {
    TemporalPattern::Delayed
  } else {
    TemporalPattern::Normal
  }
}

// --- Explicit-link validation ---

#[derive(Debug, Clone, Copy)]
pub struct ExplicitPolicy {
  pub bidirectional_boost: f64,
  pub closing_comment_boost: f64,
  pub strong_negative_penalty: f64,
  pub partial_negative_penalty: f64,
  pub confidence_cap: f64,
  pub high_quality: f64,
  pub medium_quality: f64,
  pub manual_review_below: f64,
  pub simultaneous_secs: i64,
  pub normal_secs: i64,
}

impl Default for ExplicitPolicy {
  fn default() -> Self {
    Self {
      bidirectional_boost: 0.10,
      closing_comment_boost: 0.05,
      strong_negative_penalty: -0.15,
      partial_negative_penalty: -0.08,
      confidence_cap: 0.98,
      high_quality: 0.85,
      medium_quality: 0.70,
      manual_review_below: 0.50,
      simultaneous_secs: 5 * 60,
      normal_secs: 3 * 86_400,
    }
  }
}

/// Boost from the strongest textual dimension.
pub fn semantic_boost(max_score: f64) -> f64 {
  if max_score >= 0.70 {
    0.15
  } else if max_score >= 0.50 {
    0.10
  } else if max_score >= 0.30 {
    0.05
  } else {
    0.0
  }
}

/// Boost for a PR that merged shortly before the issue closed; reverse order earns nothing.
pub fn temporal_boost(delta_seconds: i64) -> f64 {
  if delta_seconds < 0 {
    return 0.0;
  }

  let minutes = delta_seconds as f64 / 60.0;
  if minutes < 5.0 {
    0.15
  } else if minutes < 60.0 {
    0.12
  } else if minutes < 24.0 * 60.0 {
    0.08
  } else if minutes < 3.0 * 24.0 * 60.0 {
    0.05
  } else {
    0.0
  }
}

pub fn explicit_temporal_pattern(delta_seconds: i64, p: &ExplicitPolicy) -> TemporalPattern {
  if delta_seconds < 0 {
    TemporalPattern::Reverse
  } else if delta_seconds < p.simultaneous_secs {
    TemporalPattern::Simultaneous
  } else if delta_seconds < p.normal_secs {
    TemporalPattern::Normal
  } else {
    TemporalPattern::Delayed
  }
}

/// Sum of base, boosts and penalty, clamped to [0, 0.98].
pub fn explicit_confidence(base: f64, bidirectional: f64, semantic: f64, temporal: f64, penalty: f64, p: &ExplicitPolicy) -> f64 {
  clamp(base + bidirectional + semantic + temporal + penalty, 0.0, p.confidence_cap)
}

pub fn explicit_link_quality(confidence: f64, p: &ExplicitPolicy) -> LinkQuality {
  if confidence >= p.high_quality {
    LinkQuality::High
  } else if confidence >= p.medium_quality {
    LinkQuality::Medium
  } else {
    LinkQuality::Low
  }
}
