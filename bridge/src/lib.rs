//! # GitLab Crucible Bridge
//!
//! Receives GitLab system hooks and asks Crucible to re-index the matching
//! repository.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │     GitLab      │────►│     Bridge      │────►│    Crucible     │
//! │  (system hook)  │     │  (this crate)   │     │ incremental idx │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!                                  ▲
//!                                  │ periodic listing
//!                          repository directory
//! ```
//!
//! ## Endpoints
//!
//! - `GET /` - Liveness check
//! - `POST /` - GitLab system hook receiver
//! - `GET /health` - 200 once the repository directory is populated, 412 before
//! - `GET /metrics` - Prometheus metrics endpoint

pub mod error;
pub mod gitlab;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::BridgeError;
pub use server::BridgeServer;
pub use state::{AppState, BridgeConfig};
