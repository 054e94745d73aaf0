//! HTTP server for resumable chunked uploads.
//!
//! This crate provides the upload control plane:
//! - Session start with identity-keyed resume
//! - Chunk presence probes and chunk delivery
//! - Finish with completeness verification and atomic commit

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
