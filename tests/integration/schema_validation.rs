use jsonschema::validator_for;

use crate::common;

fn read_schema(name: &str) -> serde_json::Value {
  let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
  let path = manifest_dir.join("tests").join("schemas").join(name);
  let data = std::fs::read(&path).expect("schema file");
  serde_json::from_slice(&data).expect("valid schema JSON")
}

fn compile_schema(name: &str) -> jsonschema::Validator {
  let schema = read_schema(name);
  validator_for(&schema).expect("compile schema")
}

#[test]
fn full_report_conforms_to_schema() {
  let dir = test_support::tempdir();
  let report = common::run_to_file(&mut common::linker_cmd("llm/classify.json"), dir.path());

  let compiled = compile_schema("run_report.schema.json");
  compiled.validate(&report).expect("schema validation failed for run report");
}

#[test]
fn report_with_failures_conforms_to_schema() {
  let dir = test_support::tempdir();
  let report = common::run_to_file(&mut common::linker_cmd("llm/classify_timeout.json"), dir.path());

  let compiled = compile_schema("run_report.schema.json");
  compiled.validate(&report).expect("schema validation failed for report with a failed issue");
}

#[test]
fn schema_rejects_a_link_without_detection_method() {
  let dir = test_support::tempdir();
  let mut report = common::run_to_file(&mut common::linker_cmd("llm/classify.json"), dir.path());
  report["outcomes"][0]["links"][0]
    .as_object_mut()
    .unwrap()
    .remove("detection_method");

  let compiled = compile_schema("run_report.schema.json");
  assert!(!compiled.is_valid(&report));
}
