use predicates::prelude::*;
use serde_json::json;

use crate::common;

#[test]
fn dry_run_prints_summary_without_outcomes() {
  let out = common::linker_cmd("llm/classify.json")
    .arg("--dry-run")
    .output()
    .unwrap();
  assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

  let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
  assert_eq!(v["repository"], "acme/widgets");
  assert_eq!(v["dry_run"], true);
  assert!(v.get("outcomes").is_none());
  assert_eq!(
    v["stats"],
    json!({ "total_issues": 3, "path_a": 1, "path_b": 2, "links_created": 2, "no_links": 1, "failed": 0 })
  );
  assert_eq!(v["dora"]["sample_size"], 3);
  assert_eq!(v["dora"]["insufficient_history"], true);
  assert_eq!(v["dora"]["median_lead_time_hours"], 26.0);
  assert_eq!(v["timeline_links_found"], 1);
  assert_eq!(v["failed_issues"], json!([]));
}

#[test]
fn out_file_holds_one_outcome_per_closed_issue() {
  let dir = test_support::tempdir();
  let report = common::run_to_file(&mut common::linker_cmd("llm/classify.json"), dir.path());

  let outcomes = report["outcomes"].as_array().unwrap();
  let numbers: Vec<u64> = outcomes.iter().map(|o| o["issue_number"].as_u64().unwrap()).collect();
  assert_eq!(numbers, vec![101, 102, 103]);

  // 101: timeline-verified reference, confirmed from the issue side.
  let explicit = &outcomes[0];
  assert_eq!(explicit["outcome"], "linked");
  assert_eq!(explicit["path"], "explicit");
  let link = &explicit["links"][0];
  assert_eq!(link["pr_number"], 201);
  assert_eq!(link["detection_method"], "explicit_bidirectional");
  assert_eq!(link["link_quality"], "high");
  assert!(link["final_confidence"].as_f64().unwrap() <= 0.98);

  // 102: no reference, found through the temporal window and ranking.
  let deep = &outcomes[1];
  assert_eq!(deep["path"], "deep");
  let link = &deep["links"][0];
  assert_eq!(link["pr_number"], 202);
  assert_eq!(link["detection_method"], "deep_link_finder");
  assert_eq!(link["temporal_analysis"]["delta_seconds"], 7200);
  assert_eq!(link["temporal_analysis"]["pattern"], "normal");
  let conf = link["final_confidence"].as_f64().unwrap();
  assert!((0.5..=0.85).contains(&conf), "deep confidence {conf}");

  // 103: a usage question never reaches the candidate search.
  let no_link = &outcomes[2];
  assert_eq!(no_link["outcome"], "no_link");
  assert_eq!(no_link["reason"], "not_a_bug");
  assert_eq!(no_link["candidates_evaluated"], 0);
}

#[test]
fn transient_llm_failure_marks_issue_failed_and_run_succeeds() {
  let dir = test_support::tempdir();
  let report = common::run_to_file(&mut common::linker_cmd("llm/classify_timeout.json"), dir.path());

  assert_eq!(report["failed_issues"], json!([102]));
  assert_eq!(report["stats"]["failed"], 1);
  assert_eq!(report["stats"]["total_issues"], 3);
  let failed = &report["outcomes"][1];
  assert_eq!(failed["outcome"], "failed");
  assert_eq!(failed["kind"], "transient_upstream");
  assert!(failed.get("reason").is_none());
}

#[test]
fn disabled_llm_exits_with_one_line_and_status_2() {
  let snapshot = test_support::fixture_path("snapshot_widgets.json");
  let out = common::bare_cmd()
    .args(["--repo", "acme/widgets", "--snapshot"])
    .arg(snapshot)
    .output()
    .unwrap();

  assert_eq!(out.status.code(), Some(2));
  assert!(out.stdout.is_empty());
  let stderr = String::from_utf8_lossy(&out.stderr);
  assert_eq!(stderr.trim_end().lines().count(), 1, "stderr: {stderr}");
  assert!(stderr.contains("LLM client not enabled"));
}

#[test]
fn configuration_problems_exit_with_status_2() {
  let snapshot = test_support::fixture_path("snapshot_widgets.json");

  // Unknown repository
  common::fixture_cmd("llm/classify.json")
    .args(["--repo", "acme/gadgets", "--snapshot"])
    .arg(&snapshot)
    .assert()
    .code(2)
    .stderr(predicate::str::contains("acme/gadgets"));

  // Malformed repository name
  common::fixture_cmd("llm/classify.json")
    .args(["--repo", "widgets", "--snapshot"])
    .arg(&snapshot)
    .assert()
    .code(2)
    .stderr(predicate::str::contains("owner/name"));

  // Missing snapshot file
  common::fixture_cmd("llm/classify.json")
    .args(["--repo", "acme/widgets", "--snapshot", "/nonexistent/snapshot.json"])
    .assert()
    .code(2)
    .stderr(predicate::str::contains("unavailable"));
}

#[test]
fn snapshot_can_come_from_the_environment() {
  let snapshot = test_support::fixture_path("snapshot_widgets.json");
  let mut cmd = common::fixture_cmd("llm/classify.json");
  cmd
    .env("LINKER_SNAPSHOT", snapshot)
    .args(["--repo", "acme/widgets", "--dry-run"]);

  cmd.assert().success().stdout(predicate::str::contains("\"total_issues\": 3"));
}
