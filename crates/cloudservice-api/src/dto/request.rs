//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use cloudservice_core::types::id::PluginId;
use cloudservice_entity::plugin::PluginPosition;
use cloudservice_entity::plugin_log::PluginAction;

use crate::extractors::PaginationParams;

/// Query for `GET /api/preview`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PreviewQuery {
    /// File path relative to the data root.
    #[validate(length(min = 1, max = 4096, message = "path is required"))]
    pub path: String,
    /// MIME type override; guessed from the file name when absent.
    #[validate(length(min = 3, max = 255))]
    pub mime_type: Option<String>,
}

/// Body of `PUT /api/admin/plugins/{id}/position`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePositionRequest {
    pub position: PluginPosition,
}

/// Query for the plugin audit log endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    /// Restrict to one plugin.
    pub plugin_id: Option<PluginId>,
    /// Restrict to one action.
    pub action: Option<PluginAction>,
    /// Page number (1-based).
    pub page: Option<u64>,
    /// Items per page.
    pub per_page: Option<u64>,
}

impl LogQuery {
    /// Pagination part of the query.
    pub fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}
