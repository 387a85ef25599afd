use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::models::{CurrentUser, UserRole};
use crate::services::AuthService;
use crate::AppState;

/// Authentication middleware
/// Extracts and validates JWT from Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return Err(AppError::Unauthorized(
                "Missing or invalid Authorization header".to_string(),
            ));
        }
    };

    let claims = AuthService::validate_token(token, &state.config)?;

    // Email and role are read back from the row so a stale token cannot
    // carry them forward.
    let (db_email, db_role): (String, String) =
        sqlx::query_as("SELECT email, role FROM users WHERE id = ?")
            .bind(&claims.sub)
            .fetch_one(state.db.pool())
            .await
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    let current_user = CurrentUser {
        id: claims.sub,
        email: db_email,
        role: UserRole::from_str(&db_role),
    };

    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}
