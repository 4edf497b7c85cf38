// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Utilities for paths, run clock handling, UTF-8 safe text clipping, and man page rendering
// role: utilities/helpers
// inputs: Various primitives; DateTime; paths; clap CommandFactory
// outputs: Canonicalized paths, the effective run instant, clipped strings, man page text
// side_effects: None (canonicalize_lossy touches the filesystem read-only)
// invariants:
// - truncate_chars and head_tail never split a UTF-8 character
// - effective_now is the only place that reads the wall clock
// errors: parse_now_override reports the offending input
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use clap::CommandFactory;

pub fn canonicalize_lossy<P: AsRef<Path>>(p: P) -> String {
  let p = p.as_ref();
  let pb: PathBuf = match std::fs::canonicalize(p) {
    Ok(x) => x,
    Err(_) => match std::env::current_dir() {
      Ok(cwd) => cwd.join(p),
      Err(_) => PathBuf::from(p),
    },
  };
  pb.to_string_lossy().to_string()
}

/// Returns the effective "now" given an optional override.
///
/// When `override_now` is `Some`, that instant is returned; otherwise
/// the current UTC time is used. Every timestamp a run emits derives from
/// this single instant, so reruns with a fixed override are byte-identical.
pub fn effective_now(override_now: Option<DateTime<Utc>>) -> DateTime<Utc> {
  override_now.unwrap_or_else(Utc::now)
}

/// Parse the hidden `--now-override` value: RFC 3339, or a naive
/// `%Y-%m-%dT%H:%M:%S` timestamp interpreted as UTC.
pub fn parse_now_override(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
    return Ok(None);
  };

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(Some(dt.with_timezone(&Utc)));
  }

  match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
    Ok(naive) => Ok(Some(naive.and_utc())),
    Err(_) => bail!("Invalid --now-override '{}': expected RFC 3339 or YYYY-MM-DDTHH:MM:SS", s),
  }
}

/// RFC 3339 with second precision and a `Z` suffix.
pub fn iso_utc(dt: &DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Signed seconds from `start` to `end`.
pub fn signed_seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
  (end - start).num_seconds()
}

/// Keep at most `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
  match s.char_indices().nth(max_chars) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Keep the first `head` and last `tail` characters of `s`, joined by `marker`.
/// Returns `s` unchanged when it is not longer than `head + tail`.
pub fn head_tail(s: &str, head: usize, tail: usize, marker: &str) -> String {
  let total = s.chars().count();
  if total <= head + tail {
    return s.to_string();
  }

  let head_part = truncate_chars(s, head);
  let tail_start = s
    .char_indices()
    .nth(total - tail)
    .map(|(idx, _)| idx)
    .unwrap_or(s.len());

  format!("{}{}{}", head_part, marker, &s[tail_start..])
}

/// Render a section-1 man page for a clap `CommandFactory` implementor.
/// Returns the troff content as a UTF-8 string.
pub fn render_man_page<T: CommandFactory>() -> anyhow::Result<String> {
  let cmd = T::command();
  let man = clap_mangen::Man::new(cmd);
  let mut buf: Vec<u8> = Vec::new();

  man.render(&mut buf)?;

  Ok(String::from_utf8_lossy(&buf).to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use clap::Parser;

  #[test]
  fn canonicalize_returns_abs_path() {
    let abs = canonicalize_lossy(".");
    assert!(abs.starts_with('/'));
  }

  #[test]
  fn now_override_accepts_rfc3339_and_naive() {
    let a = parse_now_override(Some("2025-08-15T12:00:00Z")).unwrap().unwrap();
    let b = parse_now_override(Some("2025-08-15T12:00:00")).unwrap().unwrap();
    assert_eq!(a, b);
    assert_eq!(a, Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap());
    assert!(parse_now_override(None).unwrap().is_none());
    assert!(parse_now_override(Some("yesterday-ish")).is_err());
  }

  #[test]
  fn effective_now_prefers_override() {
    let fixed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(effective_now(Some(fixed)), fixed);
  }

  #[test]
  fn iso_utc_has_z_suffix() {
    let dt = Utc.with_ymd_and_hms(2024, 9, 12, 0, 30, 0).unwrap();
    assert_eq!(iso_utc(&dt), "2024-09-12T00:30:00Z");
  }

  #[test]
  fn signed_seconds_keep_direction() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
    assert_eq!(signed_seconds_between(a, b), 7200);
    assert_eq!(signed_seconds_between(b, a), -7200);
  }

  #[test]
  fn truncate_never_splits_utf8() {
    assert_eq!(truncate_chars("ééé", 2), "éé");
    assert_eq!(truncate_chars("abc", 10), "abc");
  }

  #[test]
  fn head_tail_keeps_both_ends() {
    let s: String = std::iter::repeat('a').take(10).chain(std::iter::repeat('z').take(10)).collect();
    let out = head_tail(&s, 3, 2, "..");
    assert_eq!(out, "aaa..zz");
    assert_eq!(head_tail("short", 3, 3, ".."), "short");
  }

  #[derive(Parser, Debug)]
  #[command(name = "dummy", version, about = "Dummy CLI", long_about = None)]
  struct DummyCli;

  #[test]
  fn render_man_page_produces_troff_text() {
    let page = render_man_page::<DummyCli>().expect("render manpage");
    assert!(page.contains(".TH"));
    assert!(page.to_lowercase().contains("dummy"));
  }
}
