//! Output formatting module
//!
//! Renders suite runs, stage results and stage plans for the terminal.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
