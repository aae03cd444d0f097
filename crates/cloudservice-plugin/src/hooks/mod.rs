//! Hook points, typed handlers and the registry.

pub mod definitions;
pub mod handler;
pub mod registry;

pub use definitions::{HookCapability, HookPoint};
pub use handler::HookHandler;
pub use registry::{HookEntry, HookRegistration, HookRegistry};
