//! Attribute closed GitHub issues to the pull requests that fixed them.
//!
//! Staged repository data is read through [`staging::StagingStore`], LLM tasks go
//! through [`llm::LlmClient`], and [`linking::Linker`] drives a run into a
//! [`model::RunReport`] with exactly one terminal outcome per closed issue.

pub mod cancel;
pub mod cli;
pub mod error;
pub mod ext;
pub mod linking;
pub mod llm;
pub mod model;
pub mod report;
pub mod staging;
pub mod util;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
