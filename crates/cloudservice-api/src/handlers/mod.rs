//! Route handlers organized by domain.

pub mod admin;
pub mod dashboard;
pub mod health;
pub mod preview;
