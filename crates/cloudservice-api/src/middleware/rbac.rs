//! Role guards for admin routes.

use cloudservice_core::error::AppError;

use crate::extractors::AuthUser;

/// Rejects non-admins before a handler touches the request body. The
/// service layer checks again for callers that bypass HTTP.
pub fn require_admin(auth: &AuthUser) -> Result<(), AppError> {
    auth.0.require_admin()
}
