//! `[auth]` section. Tokens are minted elsewhere (or by the CLI); the
//! server only verifies them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret.
    pub jwt_secret: String,
    /// Lifetime of tokens issued by `cloudservice token issue`.
    pub jwt_access_ttl_minutes: u64,
    /// Required `iss` claim.
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".into(),
            jwt_access_ttl_minutes: 60,
            issuer: "cloudservice".into(),
        }
    }
}
