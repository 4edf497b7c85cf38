use crate::common;

#[test]
fn cli_generates_man_page() {
  let out = common::bare_cmd().arg("--gen-man").output().unwrap();
  assert!(out.status.success());
  let s = String::from_utf8_lossy(&out.stdout);
  // clap_mangen emits a roff manpage starting with .TH and mentions the binary name
  assert!(s.contains(".TH") || s.contains(".Nm"));
  assert!(s.contains("issue-pr-linker"));
  assert!(s.contains("snapshot"));
}
