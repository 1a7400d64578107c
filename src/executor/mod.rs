//! Test execution engine
//!
//! Runs the suite either with the built-in HTTP runner or through an
//! external command.

mod command;
mod runner;

pub use runner::TestRunner;
