//! # cloudservice-api
//!
//! HTTP API layer for CloudService built on Axum.
//!
//! Provides the plugin administration endpoints, the file preview
//! endpoint, bearer-token extractors, request logging, DTOs, and error
//! mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use error::ApiError;
pub use state::AppState;
