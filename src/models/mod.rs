//! Data models for the reporting pipeline
//!
//! This module contains all data structures shared between stages.

mod stage;
mod test_result;

pub use stage::{StageKind, StagePolicy, StageResult, StageStatus};
pub use test_result::{RunLabels, RunSummary, SuiteRun, TestCaseResult, TestOutcome};
