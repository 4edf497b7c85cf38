// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Turn GitHub-verified cross-reference timeline events into issue→PR links (Phase 0)
// role: linking/timeline
// inputs: StagingStore cross-reference events; closed issue numbers
// outputs: TimelineLinks map keyed by issue number (every closed issue present, possibly empty)
// invariants:
// - base_confidence is fixed at 0.95
// - One link per (issue, PR) pair; the earliest event wins
// - reference_type inferred from keywords within 100 chars of `#N` in the first 500 chars of title + body
// errors: StoreError from the event query
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cancel::CancelToken;
use crate::error::StoreError;
use crate::model::{ReferenceType, RepoId, TimelineLink};
use crate::staging::StagingStore;

pub const TIMELINE_BASE_CONFIDENCE: f64 = 0.95;

const SCAN_CHARS: usize = 500;
const KEYWORD_RADIUS: usize = 100;
const SNIPPET_RADIUS: usize = 50;

/// Timeline links per closed issue, in PR-number order.
pub type TimelineLinks = BTreeMap<u64, Vec<TimelineLink>>;

static FIXES_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\b(?:fix|fixes|fixed|close|closes|closed|resolve|resolves|resolved)\b").unwrap());
static ADDRESSES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:address|addresses)\b").unwrap());
static FOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfor\s+(?:issue\b|#)").unwrap());

/// Byte range of the first `#N` reference (whole number) in `text`.
fn find_reference(text: &str, issue_number: u64) -> Option<(usize, usize)> {
  let re = Regex::new(&format!(r"#{}\b", issue_number)).ok()?;
  re.find(text).map(|m| (m.start(), m.end()))
}

/// Byte offset `n` (> 0) characters before `byte_idx`, clamped to the start.
fn back_chars(text: &str, byte_idx: usize, n: usize) -> usize {
  text[..byte_idx]
    .char_indices()
    .rev()
    .nth(n - 1)
    .map(|(i, _)| i)
    .unwrap_or(0)
}

/// Byte offset `n` characters after `byte_idx` (clamped to the end).
fn forward_chars(text: &str, byte_idx: usize, n: usize) -> usize {
  text[byte_idx..]
    .char_indices()
    .nth(n)
    .map(|(i, _)| byte_idx + i)
    .unwrap_or(text.len())
}

fn scanned(text: &str) -> &str {
  crate::util::truncate_chars(text, SCAN_CHARS)
}

/// Classify how a PR's text refers to an issue. Without a nearby keyword (or
/// without the reference itself) the link is a plain mention.
pub fn infer_reference_type(text: &str, issue_number: u64) -> ReferenceType {
  let text = scanned(text);
  let Some((start, end)) = find_reference(text, issue_number) else {
    return ReferenceType::Mentions;
  };

  let lo = back_chars(text, start, KEYWORD_RADIUS);
  let hi = forward_chars(text, end, KEYWORD_RADIUS);
  let window = text[lo..hi].to_lowercase();

  if FIXES_RE.is_match(&window) {
    ReferenceType::Fixes
  } else if ADDRESSES_RE.is_match(&window) {
    ReferenceType::Addresses
  } else if FOR_RE.is_match(&window) {
    ReferenceType::For
  } else {
    ReferenceType::Mentions
  }
}

/// ±50-character snippet around `#N`, with "..." where the text was cut.
/// Empty when the reference does not occur in the scanned text.
pub fn extract_snippet(text: &str, issue_number: u64) -> String {
  let text = scanned(text);
  let Some((start, end)) = find_reference(text, issue_number) else {
    return String::new();
  };

  let lo = back_chars(text, start, SNIPPET_RADIUS);
  let hi = forward_chars(text, end, SNIPPET_RADIUS);

  let mut out = String::new();
  if lo > 0 {
    out.push_str("...");
  }
  out.push_str(text[lo..hi].trim());
  if hi < text.len() {
    out.push_str("...");
  }
  out
}

pub fn extract_timeline_links(
  store: &dyn StagingStore,
  cancel: &CancelToken,
  repo: RepoId,
  issue_numbers: &[u64],
) -> Result<TimelineLinks, StoreError> {
  let mut links: TimelineLinks = issue_numbers.iter().map(|n| (*n, Vec::new())).collect();

  for event in store.cross_reference_events(cancel, repo)? {
    if !event.is_pull_request_cross_reference() {
      continue;
    }
    let Some(bucket) = links.get_mut(&event.issue_number) else {
      continue;
    };
    if bucket.iter().any(|l| l.pr_number == event.source_number) {
      continue;
    }

    let text = format!("{}\n{}", event.source_title, event.source_body);
    bucket.push(TimelineLink {
      issue_number: event.issue_number,
      pr_number: event.source_number,
      reference_type: infer_reference_type(&text, event.issue_number),
      extracted_text: extract_snippet(&text, event.issue_number),
      base_confidence: TIMELINE_BASE_CONFIDENCE,
    });
  }

  for bucket in links.values_mut() {
    bucket.sort_by_key(|l| l.pr_number);
  }

  let total: usize = links.values().map(Vec::len).sum();
  tracing::info!(issues = links.len(), links = total, "extracted timeline links");

  Ok(links)
}
