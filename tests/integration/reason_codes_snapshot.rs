use crate::common;

/// One row per outcome: the terminal state and what decided it.
fn outcome_rows(report: &serde_json::Value) -> Vec<serde_json::Value> {
  report["outcomes"]
    .as_array()
    .unwrap()
    .iter()
    .map(|o| {
      let detail = match o["outcome"].as_str().unwrap() {
        "linked" => o["path"].clone(),
        "no_link" => o["reason"].clone(),
        _ => o["kind"].clone(),
      };
      serde_json::json!({
        "detail": detail,
        "issue": o["issue_number"],
        "outcome": o["outcome"],
      })
    })
    .collect()
}

#[test]
fn widgets_outcomes_snapshot() {
  let dir = test_support::tempdir();
  let report = common::run_to_file(&mut common::linker_cmd("llm/classify_timeout.json"), dir.path());

  insta::assert_json_snapshot!(outcome_rows(&report), @r###"
  [
    {
      "detail": "explicit",
      "issue": 101,
      "outcome": "linked"
    },
    {
      "detail": "transient_upstream",
      "issue": 102,
      "outcome": "failed"
    },
    {
      "detail": "not_a_bug",
      "issue": 103,
      "outcome": "no_link"
    }
  ]
  "###);
}
