// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Issue-to-PR linking pipeline: repository-wide phases, explicit validation, and the deep link finder
// role: linking/aggregator
// inputs: StagingStore, LlmClient, CancelToken, run clock
// outputs: Per-issue outcomes and the aggregated RunReport
// invariants:
// - Exactly one terminal outcome per closed issue
// - Deep-link confidence bounded to [0.50, 0.85]
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

pub mod candidates;
pub mod classifier;
pub mod decision;
pub mod dora;
pub mod explicit;
pub mod orchestrator;
pub mod policy;
pub mod ranker;
pub mod timeline;
pub mod validation;

pub use orchestrator::{Linker, RunRequest};
