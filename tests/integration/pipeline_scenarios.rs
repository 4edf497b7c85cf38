use issue_pr_linker::cancel::CancelToken;
use issue_pr_linker::error::{ErrorKind, LlmError};
use issue_pr_linker::linking::{Linker, RunRequest};
use issue_pr_linker::llm::PromptKind;
use issue_pr_linker::model::{
  DetectionMethod, IssueOutcome, LinkPath, LinkQuality, NoLinkReason, RunReport, TemporalDirection, TemporalPattern,
};
use issue_pr_linker::staging::SnapshotStore;

use crate::common::{self, classification, closed_issue, hours, pr, rankings, ts, FakeLlm};

fn run(store: &SnapshotStore, llm: &FakeLlm) -> RunReport {
  test_support::init_tracing();
  let req = RunRequest {
    repo: "acme/widgets".into(),
    days: 0,
    dry_run: true,
  };
  Linker::new(store, llm, ts(common::NOW))
    .with_workers(2)
    .run(&CancelToken::new(), &req)
    .expect("run succeeds")
}

fn only_outcome(report: &RunReport) -> &IssueOutcome {
  assert_eq!(report.outcomes.len(), 1);
  &report.outcomes[0]
}

#[test]
fn pr_merged_two_hours_before_close_becomes_a_deep_link() {
  let closed = ts("2025-02-20T12:00:00Z");
  let store = common::store(
    vec![closed_issue(1, "Crash on save", closed, "Should be fixed now.")],
    vec![pr(10, "Guard null buffer on save", "Avoid crash", closed - hours(2))],
    vec![],
  );
  let llm = FakeLlm::new(|kind, _| match kind {
    PromptKind::ClosureClassification => Ok(classification("fixed_with_code", 0.9)),
    PromptKind::CandidateRanking => Ok(rankings(&[(10, 0.9, 0.8, 0.85)])),
    _ => Ok(r#"{"results":[]}"#.into()),
  });

  let report = run(&store, &llm);
  let IssueOutcome::Linked { path, links, .. } = only_outcome(&report) else {
    panic!("expected a link, got {:?}", report.outcomes);
  };
  assert_eq!(*path, LinkPath::Deep);
  assert_eq!(links.len(), 1);

  let link = &links[0];
  assert_eq!(link.pr_number, 10);
  assert_eq!(link.detection_method, DetectionMethod::DeepLinkFinder);
  assert_eq!(link.temporal_analysis.delta_seconds, 7200);
  assert_eq!(link.temporal_analysis.pattern, TemporalPattern::Normal);
  assert_eq!(link.temporal_analysis.issue_closed_at, closed);
  assert!(!link.flags.reverse_temporal);
  // score = 0.3*(1 - 7200/259200) + 0.3*0.85 + 0.2*0.8 + 0.15*0.9
  let score = 0.3 * (1.0 - 7200.0 / 259200.0) + 0.3 * 0.85 + 0.2 * 0.8 + 0.15 * 0.9;
  assert!((link.final_confidence - (0.5 + 0.35 * score)).abs() < 1e-9);
  assert_eq!(link.link_quality, LinkQuality::Medium);
  assert!(link.comprehensive_rationale.starts_with("DEEP LINK found via temporal-semantic analysis"));
  assert_eq!(report.stats.path_b, 1);
}

#[test]
fn forty_hour_median_narrows_the_window_to_a_day_and_a_half() {
  let closed = ts("2025-02-20T12:00:00Z");
  let with_lead_time = |mut p: issue_pr_linker::model::PullRequestData| {
    p.created_at = p.merged_at.expect("merged") - hours(40);
    p
  };
  let mut prs: Vec<_> = (0..10)
    .map(|i| with_lead_time(pr(100 + i, "Unrelated cleanup", "", closed - hours(24 * 30 + i as i64))))
    .collect();
  prs.push(with_lead_time(pr(10, "Guard null buffer on save", "Avoid crash", closed - hours(2))));
  let store = common::store(
    vec![closed_issue(1, "Crash on save", closed, "Should be fixed now.")],
    prs,
    vec![],
  );
  let llm = FakeLlm::new(|kind, _| match kind {
    PromptKind::ClosureClassification => Ok(classification("fixed_with_code", 0.9)),
    PromptKind::CandidateRanking => Ok(rankings(&[(10, 0.9, 0.8, 0.95)])),
    _ => Ok(r#"{"results":[]}"#.into()),
  });

  let report = run(&store, &llm);
  assert_eq!(report.dora.sample_size, 11);
  assert_eq!(report.dora.median_lead_time_hours, 40.0);
  assert!(!report.dora.insufficient_history);

  let IssueOutcome::Linked { path, links, .. } = only_outcome(&report) else {
    panic!("expected a link, got {:?}", report.outcomes);
  };
  assert_eq!(*path, LinkPath::Deep);
  assert_eq!(links.len(), 1);

  let link = &links[0];
  assert_eq!(link.pr_number, 10);
  assert_eq!(link.temporal_analysis.delta_seconds, 7200);
  assert_eq!(link.temporal_analysis.pattern, TemporalPattern::Normal);
  assert_eq!(link.link_quality, LinkQuality::Medium);
  assert!(link.comprehensive_rationale.contains("window: ±1.5 days"));
  // 0.75 * 40h = 30h, clamped up to 36h = 129600s
  let score = 0.3 * (1.0 - 7200.0 / 129600.0) + 0.3 * 0.95 + 0.2 * 0.8 + 0.15 * 0.9;
  assert!((link.final_confidence - (0.5 + 0.35 * score)).abs() < 1e-9);
  assert!((0.5..=0.85).contains(&link.final_confidence));
}

#[test]
fn pr_merged_after_close_is_flagged_reverse() {
  let closed = ts("2025-02-20T12:00:00Z");
  let store = common::store(
    vec![closed_issue(1, "Crash on save", closed, "Reopening if it comes back.")],
    vec![pr(10, "Guard null buffer on save", "Avoid crash", closed + hours(2))],
    vec![],
  );
  let llm = FakeLlm::new(|kind, _| match kind {
    PromptKind::ClosureClassification => Ok(classification("fixed_with_code", 0.9)),
    PromptKind::CandidateRanking => Ok(rankings(&[(10, 0.9, 0.8, 0.85)])),
    _ => Ok(r#"{"results":[]}"#.into()),
  });

  let report = run(&store, &llm);
  let link = &only_outcome(&report).links()[0];
  assert_eq!(link.temporal_analysis.delta_seconds, -7200);
  assert_eq!(link.temporal_analysis.direction, TemporalDirection::Reverse);
  assert_eq!(link.temporal_analysis.pattern, TemporalPattern::Reverse);
  assert!(link.flags.reverse_temporal);
}

#[test]
fn not_a_bug_never_reaches_ranking() {
  let closed = ts("2025-02-20T12:00:00Z");
  let store = common::store(
    vec![closed_issue(1, "How do I export?", closed, "Answered above, closing.")],
    vec![pr(10, "Export docs", "", closed - hours(1))],
    vec![],
  );
  let llm = FakeLlm::new(|kind, _| match kind {
    PromptKind::ClosureClassification => Ok(classification("not_a_bug", 0.95)),
    PromptKind::CandidateRanking => panic!("ranking must not run"),
    _ => Ok(r#"{"results":[]}"#.into()),
  });

  let report = run(&store, &llm);
  let IssueOutcome::NoLink(verdict) = only_outcome(&report) else {
    panic!("expected no link, got {:?}", report.outcomes);
  };
  assert_eq!(verdict.reason, NoLinkReason::NotABug);
  assert_eq!(verdict.candidates_evaluated, 0);
  assert_eq!(llm.calls(PromptKind::CandidateRanking), 0);
  assert_eq!(llm.calls(PromptKind::ClosureClassification), 1);
}

#[test]
fn deep_links_are_capped_at_three_best_first() {
  let closed = ts("2025-02-20T12:00:00Z");
  let prs = (1..=5)
    .map(|i| pr(20 + i, &format!("Fix part {i}"), "", closed - hours(i as i64)))
    .collect();
  let store = common::store(vec![closed_issue(1, "Several crashes", closed, "All fixed.")], prs, vec![]);
  let llm = FakeLlm::new(|kind, _| match kind {
    PromptKind::ClosureClassification => Ok(classification("fixed_with_code", 0.9)),
    PromptKind::CandidateRanking => Ok(rankings(&[
      (21, 0.9, 0.9, 0.9),
      (22, 0.9, 0.9, 0.9),
      (23, 0.9, 0.9, 0.9),
      (24, 0.9, 0.9, 0.9),
      (25, 0.9, 0.9, 0.9),
    ])),
    _ => Ok(r#"{"results":[]}"#.into()),
  });

  let report = run(&store, &llm);
  let links = only_outcome(&report).links();
  let prs: Vec<u64> = links.iter().map(|l| l.pr_number).collect();
  assert_eq!(prs, vec![21, 22, 23]);
  // Candidates one hour apart nearly tie, so none is trusted on its own.
  assert!(links.iter().all(|l| l.link_quality == LinkQuality::Low));
  assert!(links.windows(2).all(|w| w[0].final_confidence >= w[1].final_confidence));
}

#[test]
fn distant_weak_candidate_trips_the_safety_brake() {
  let closed = ts("2025-02-20T12:00:00Z");
  let store = common::store(
    vec![closed_issue(1, "Crash on save", closed, "Fixed.")],
    vec![pr(10, "Bump dependencies", "", closed - hours(60))],
    vec![],
  );
  let llm = FakeLlm::new(|kind, _| match kind {
    PromptKind::ClosureClassification => Ok(classification("fixed_with_code", 0.9)),
    PromptKind::CandidateRanking => Ok(rankings(&[(10, 0.3, 0.3, 0.3)])),
    _ => Ok(r#"{"results":[]}"#.into()),
  });

  let report = run(&store, &llm);
  let IssueOutcome::NoLink(verdict) = only_outcome(&report) else {
    panic!("expected no link, got {:?}", report.outcomes);
  };
  assert_eq!(verdict.reason, NoLinkReason::TemporalCoincidence);
  assert!(verdict.safety_brake_reason.is_some());
  assert_eq!(verdict.candidates_evaluated, 1);
}

#[test]
fn extracted_reference_links_through_explicit_path() {
  let closed = ts("2025-02-20T12:00:00Z");
  let store = common::store(
    vec![closed_issue(5, "Export hangs", closed, "Thanks, closing.")],
    vec![pr(50, "Stream exports", "This resolves #5 by streaming.", closed - hours(1))],
    vec![],
  );
  let llm = FakeLlm::new(|kind, _| match kind {
    PromptKind::ExplicitExtraction => Ok(
      serde_json::json!({
        "results": [{
          "pr_number": 50,
          "references": [{
            "issue_number": "#5",
            "reference_type": "fixes",
            "reference_location": "pr_description",
            "extracted_text": "This resolves #5",
            "base_confidence": 0.9
          }]
        }]
      })
      .to_string(),
    ),
    PromptKind::ExplicitSemantic => Ok(
      serde_json::json!({
        "title_score": 0.8, "body_score": 0.7, "comment_score": 0.2, "cross_content_score": 0.7
      })
      .to_string(),
    ),
    _ => panic!("deep finder must not run for an explicit link"),
  });

  let report = run(&store, &llm);
  let IssueOutcome::Linked { path, links, .. } = only_outcome(&report) else {
    panic!("expected a link, got {:?}", report.outcomes);
  };
  assert_eq!(*path, LinkPath::Explicit);
  assert_eq!(links[0].pr_number, 50);
  assert_eq!(links[0].detection_method, DetectionMethod::Explicit);
  assert!(links[0].final_confidence <= 0.98);
  assert_eq!(report.explicit_references_found, 1);
  assert_eq!(report.stats.path_a, 1);
}

#[test]
fn upstream_failure_fails_only_that_issue() {
  let closed = ts("2025-02-20T12:00:00Z");
  let store = common::store(
    vec![
      closed_issue(1, "Crash on save", closed, "Fixed."),
      closed_issue(2, "Crash on load", closed, "Fixed."),
    ],
    vec![pr(10, "Guard null buffer", "", closed - hours(2))],
    vec![],
  );
  let llm = FakeLlm::new(|kind, prompt| match kind {
    PromptKind::ClosureClassification if prompt.starts_with("ISSUE #2:") => {
      Err(LlmError::Timeout(std::time::Duration::from_secs(60)))
    }
    PromptKind::ClosureClassification => Ok(classification("fixed_with_code", 0.9)),
    PromptKind::CandidateRanking => Ok(rankings(&[(10, 0.9, 0.9, 0.9)])),
    _ => Ok(r#"{"results":[]}"#.into()),
  });

  let report = run(&store, &llm);
  assert_eq!(report.outcomes.len(), 2);
  assert!(matches!(report.outcomes[0], IssueOutcome::Linked { .. }));
  let IssueOutcome::Failed(failed) = &report.outcomes[1] else {
    panic!("expected a failure, got {:?}", report.outcomes[1]);
  };
  assert_eq!(failed.issue_number, 2);
  assert_eq!(failed.kind, ErrorKind::TransientUpstream);
  assert_eq!(report.failed_issues, vec![2]);
  assert_eq!(report.stats.failed, 1);
  assert_eq!(report.stats.no_links, 0);
  // PR 10 is the best match for both issues but only one issue produced a verdict.
  assert!(report.shared_prs.is_empty());
}
