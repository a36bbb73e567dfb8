//! Shared test fixtures for the bridge workspace.
//!
//! Provides a wiremock-backed stand-in for the Crucible admin API plus JSON
//! builders for repository pages and GitLab system hooks, so the directory and
//! bridge crates can be exercised end to end without a live server.

mod fixtures;

pub use fixtures::*;
