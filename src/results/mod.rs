//! Run artifacts
//!
//! Writes the HTML report, the per-test JSON report and the summary file
//! for a finished suite run.

mod report;
mod storage;

pub use storage::{ArtifactPaths, ArtifactStore};
