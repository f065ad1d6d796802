//! Common utilities shared across the workspace.
//!
//! This crate provides:
//! - Unified error handling for HTTP and gRPC
//! - Configuration structures
//! - Single-flight request coalescing
//! - A validating JSON extractor for axum handlers
//! - Client identity resolution from proxy headers

pub mod config;
pub mod error;
pub mod extract;
pub mod identity;
pub mod singleflight;

pub use config::*;
pub use error::{AppError, AppResult, OptionExt, RateLimitInfo};
pub use extract::ValidatedJson;
pub use identity::client_identity;
pub use singleflight::Singleflight;
