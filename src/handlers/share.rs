use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::error::{ApiResponse, Result};
use crate::models::{
    CreateShareRequest, CurrentUser, FileResponse, Share, ShareListItem, VerifyShareRequest,
    VerifyShareResponse,
};
use crate::services::ShareService;
use crate::AppState;

/// Create a new share
/// POST /api/v1/shares
pub async fn create_share(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CreateShareRequest>,
) -> Result<Json<ApiResponse<Share>>> {
    let share = ShareService::create_share(&state.db, &state.config, &current_user, req).await?;
    Ok(Json(ApiResponse::success(share)))
}

/// List the caller's shares
/// GET /api/v1/shares
pub async fn list_shares(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ShareListItem>>>> {
    let shares = ShareService::list_share_items(&state.db, &current_user).await?;
    Ok(Json(ApiResponse::success(shares)))
}

/// Revoke a share
/// DELETE /api/v1/shares/:id
pub async fn revoke_share(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    ShareService::revoke_share(&state.db, &current_user, &id).await?;
    Ok(Json(ApiResponse::<()>::success_message("Share revoked")))
}

/// Redeem a share link
/// POST /api/v1/shares/verify
///
/// Unauthenticated: the (token, email) pair is the credential. On first
/// use the grant binds to the matching account, provisioning a guest one
/// if needed.
pub async fn verify_share(
    State(state): State<AppState>,
    Json(req): Json<VerifyShareRequest>,
) -> Result<Json<ApiResponse<VerifyShareResponse>>> {
    let verified = ShareService::verify_access(&state.db, &req.token, &req.email).await?;

    let permission = verified.share.get_permission().as_str().to_string();
    let response = VerifyShareResponse {
        file: FileResponse::new(verified.file, Some(permission.clone())),
        permission,
        guest_credentials: verified.guest_credentials,
    };

    Ok(Json(ApiResponse::success(response)))
}
