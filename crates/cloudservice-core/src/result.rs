//! `Result` alias used by fallible CloudService APIs.

use crate::error::AppError;

pub type AppResult<T> = Result<T, AppError>;
