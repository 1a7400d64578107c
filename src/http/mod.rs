//! HTTP client module
//!
//! Provides HTTP client functionality for running API suites.

mod client;

pub use client::{HttpClient, HttpRequest, HttpResponse};
