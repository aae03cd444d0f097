//! Response DTOs.

use serde::{Deserialize, Serialize};

use cloudservice_core::types::id::PluginId;
use cloudservice_plugin::preview::FileDescriptor;
use cloudservice_service::RenderedPreview;

/// `{"success": true, "data": ...}` envelope around every 2xx body.
/// Errors use [`ApiErrorResponse`](crate::error::ApiErrorResponse) instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Plugin modules loaded in this process. Sibling processes may differ
    /// until their reconciler catches up.
    pub loaded_plugins: usize,
}

/// Rendered preview of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// Path relative to the data root.
    pub path: String,
    /// File name.
    pub name: String,
    /// MIME type used for provider selection.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
    /// HTML fragment.
    pub html: String,
    /// Plugin that rendered the preview, if any.
    pub provider: Option<PluginId>,
    /// Why the built-in preview replaced a failing provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl PreviewResponse {
    /// Combines a file description with its rendered preview.
    pub fn new(file: FileDescriptor, preview: RenderedPreview) -> Self {
        Self {
            path: file.id,
            name: file.name,
            mime_type: file.mime_type,
            size: file.size,
            html: preview.html,
            provider: preview.provider,
            fallback_reason: preview.fallback_reason,
        }
    }
}
