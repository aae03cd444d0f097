//! # cloudservice-core
//!
//! Shared foundations for the CloudService workspace: layered
//! configuration, typed identifiers, pagination and [`AppError`].
//! Depends on no other CloudService crate.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
