//! Request and response DTOs.

pub mod request;
pub mod response;

pub use request::{LogQuery, PreviewQuery};
pub use response::{ApiResponse, HealthResponse, MessageResponse, PreviewResponse};
