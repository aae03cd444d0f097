//! # cloudservice-auth
//!
//! Bearer token handling for CloudService.
//!
//! ## Modules
//!
//! - `jwt` — HS256 token creation and validation

pub mod jwt;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
