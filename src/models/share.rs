use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

/// Permission level a share grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SharePermission {
    View,
    Download,
}

impl SharePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::View => "VIEW",
            SharePermission::Download => "DOWNLOAD",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "VIEW" => Ok(SharePermission::View),
            "DOWNLOAD" => Ok(SharePermission::Download),
            other => Err(AppError::Validation(format!(
                "permission: must be VIEW or DOWNLOAD, got {}",
                other
            ))),
        }
    }
}

/// Share model
///
/// `shared_with` stays NULL until the grant is claimed; once set it never
/// changes. Revocation forces `expires_at` to the revocation instant
/// instead of deleting the row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Share {
    pub id: String,
    pub file_id: String,
    pub created_by: String,
    pub shared_with: Option<String>,
    pub shared_with_email: String,
    pub permission: String,
    pub access_token: String,
    pub expires_at: String,
    pub created_at: String,
}

impl Share {
    pub fn get_permission(&self) -> SharePermission {
        // Column is constrained to the two valid values at write time
        SharePermission::parse(&self.permission).unwrap_or(SharePermission::View)
    }

    /// A share is live until the instant it expires
    pub fn is_live(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match chrono::DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expiry) => now < expiry,
            Err(_) => false,
        }
    }
}

/// Request to create a share
#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub file_id: String,
    pub shared_with_email: String,
    pub permission: String,
    pub expires_in_minutes: i64,
}

/// Request to redeem a share link
#[derive(Debug, Deserialize)]
pub struct VerifyShareRequest {
    pub token: String,
    pub email: String,
}

/// Credentials for a freshly provisioned guest account.
/// Returned exactly once, in the response that created the account.
#[derive(Debug, Clone, Serialize)]
pub struct GuestCredentials {
    pub username: String,
    pub password: String,
}

/// Response to a successful share verification
#[derive(Debug, Serialize)]
pub struct VerifyShareResponse {
    pub file: crate::models::FileResponse,
    pub permission: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_credentials: Option<GuestCredentials>,
}

/// Share item for listing (includes file name)
#[derive(Debug, Serialize, FromRow)]
pub struct ShareListItem {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub shared_with_email: String,
    pub permission: String,
    pub access_token: String,
    pub expires_at: String,
    pub created_at: String,
}
