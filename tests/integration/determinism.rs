use crate::common;

/// Raw report bytes: key order, float formatting and trailing newline all count.
fn report_bytes_with_workers(workers: &str) -> Vec<u8> {
  let dir = test_support::tempdir();
  let out = dir.path().join("report.json");
  let mut cmd = common::linker_cmd("llm/classify.json");
  cmd.args(["--workers", workers]).arg("--out").arg(&out).assert().success();
  std::fs::read(&out).expect("report file")
}

#[test]
fn same_inputs_give_byte_identical_reports_regardless_of_worker_count() {
  let serial = report_bytes_with_workers("1");
  let parallel = report_bytes_with_workers("8");
  let again = report_bytes_with_workers("8");

  assert!(!serial.is_empty());
  assert_eq!(serial, parallel);
  assert_eq!(parallel, again);
}
