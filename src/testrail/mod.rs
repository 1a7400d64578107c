//! TestRail integration
//!
//! Creates a run for the configured cases and posts one result per case.

mod client;
mod sync;

pub use sync::sync_run;
