use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    CreateShareRequest, CurrentUser, File, GuestCredentials, Share, ShareListItem, SharePermission,
};
use crate::services::{AccessService, FileService, UserService};

/// Length of generated access tokens
const ACCESS_TOKEN_LEN: usize = 64;

/// All share-link rejections collapse to this message so a caller probing
/// tokens cannot tell expired from nonexistent from wrong-email.
const INVALID_SHARE: &str = "Invalid or expired share link";

/// Outcome of a successful share verification
pub struct VerifiedAccess {
    pub share: Share,
    pub file: File,
    /// Present only when this verification provisioned the guest account
    pub guest_credentials: Option<GuestCredentials>,
}

/// Share service. Governs the grant lifecycle: creation, claim on first
/// verification, access re-validation, and revocation.
pub struct ShareService;

impl ShareService {
    /// Create a new share grant for a file
    pub async fn create_share(
        db: &Database,
        config: &Config,
        actor: &CurrentUser,
        req: CreateShareRequest,
    ) -> Result<Share> {
        let file = FileService::get_file(db, &req.file_id).await?;

        let access = AccessService::effective_permission(db, actor, &file).await?;
        if !access.can_manage_shares() {
            return Err(AppError::Forbidden(
                "Only the owner may share this file".to_string(),
            ));
        }

        if !req.shared_with_email.contains('@') {
            return Err(AppError::Validation(
                "shared_with_email: invalid format".to_string(),
            ));
        }

        if req.shared_with_email.eq_ignore_ascii_case(&actor.email) {
            return Err(AppError::Validation(
                "shared_with_email: you cannot share a file with yourself".to_string(),
            ));
        }

        let permission = SharePermission::parse(&req.permission)?;

        let bounds = &config.share;
        if req.expires_in_minutes < bounds.min_duration_minutes
            || req.expires_in_minutes > bounds.max_duration_minutes
        {
            return Err(AppError::Validation(format!(
                "expires_in_minutes: must be between {} and {}",
                bounds.min_duration_minutes, bounds.max_duration_minutes
            )));
        }

        let now = Utc::now();
        let expires_at = (now + Duration::minutes(req.expires_in_minutes)).to_rfc3339();
        let created_at = now.to_rfc3339();
        let share_id = Uuid::new_v4().to_string();

        // Tokens are unique across all grants; retry on the rare collision
        let mut last_error: Option<sqlx::Error> = None;
        for _ in 0..10 {
            let token: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(ACCESS_TOKEN_LEN)
                .map(char::from)
                .collect();

            let result = sqlx::query(
                r#"
                INSERT INTO shares (id, file_id, created_by, shared_with, shared_with_email, permission, access_token, expires_at, created_at)
                VALUES (?, ?, ?, NULL, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&share_id)
            .bind(&file.id)
            .bind(&actor.id)
            .bind(&req.shared_with_email)
            .bind(permission.as_str())
            .bind(&token)
            .bind(&expires_at)
            .bind(&created_at)
            .execute(db.pool())
            .await;

            match result {
                Ok(_) => {
                    tracing::info!(
                        "Created {} share {} on file {} for {}",
                        permission.as_str(),
                        share_id,
                        file.id,
                        req.shared_with_email
                    );
                    return Self::get_share(db, &share_id).await;
                }
                Err(e) => {
                    let is_token_conflict = match &e {
                        sqlx::Error::Database(db_err) => {
                            db_err.message().contains("shares.access_token")
                        }
                        _ => false,
                    };
                    if is_token_conflict {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(AppError::Internal(format!(
            "Failed to generate unique access token: {}",
            last_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        )))
    }

    /// Get share by ID
    pub async fn get_share(db: &Database, id: &str) -> Result<Share> {
        sqlx::query_as("SELECT * FROM shares WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Share not found".to_string()))
    }

    /// Redeem a share link: validate the token/email pair, bind the grant
    /// to an identity on first use, and report the granted permission.
    ///
    /// Binding happens at most once. A grant created for an email can
    /// only ever be claimed by the identity holding that email; if none
    /// exists, a guest account is provisioned and its password disclosed
    /// in this response alone.
    pub async fn verify_access(db: &Database, token: &str, email: &str) -> Result<VerifiedAccess> {
        let share: Option<Share> = sqlx::query_as("SELECT * FROM shares WHERE access_token = ?")
            .bind(token)
            .fetch_optional(db.pool())
            .await?;

        let share = match share {
            Some(s) => s,
            None => return Err(AppError::NotFound(INVALID_SHARE.to_string())),
        };

        if !share.is_live(Utc::now()) {
            return Err(AppError::NotFound(INVALID_SHARE.to_string()));
        }

        if !share.shared_with_email.eq_ignore_ascii_case(email) {
            tracing::debug!("Share {} presented with non-matching email", share.id);
            return Err(AppError::NotFound(INVALID_SHARE.to_string()));
        }

        let bound_to = share.shared_with.clone();
        let (share, guest_credentials) = match bound_to {
            Some(bound_id) => {
                let user = UserService::find_by_email(db, email).await?;
                match user {
                    Some(u) if u.id == bound_id => (share, None),
                    _ => {
                        tracing::debug!("Share {} already claimed by another identity", share.id);
                        return Err(AppError::NotFound(INVALID_SHARE.to_string()));
                    }
                }
            }
            None => Self::claim(db, share, email).await?,
        };

        let file = FileService::get_file(db, &share.file_id).await?;

        Ok(VerifiedAccess {
            share,
            file,
            guest_credentials,
        })
    }

    /// Bind an unclaimed grant to the identity resolved from its email.
    ///
    /// The conditional update is the serialization point: of any number
    /// of concurrent claimants exactly one lands the write, and the rest
    /// re-read and continue down the already-claimed path.
    async fn claim(
        db: &Database,
        share: Share,
        email: &str,
    ) -> Result<(Share, Option<GuestCredentials>)> {
        let (user, created_password) = UserService::find_or_create_guest(db, email).await?;

        let guest_credentials = created_password.map(|password| GuestCredentials {
            username: user.username.clone(),
            password,
        });

        let updated = sqlx::query(
            "UPDATE shares SET shared_with = ? WHERE id = ? AND shared_with IS NULL",
        )
        .bind(&user.id)
        .bind(&share.id)
        .execute(db.pool())
        .await?
        .rows_affected();

        if updated == 1 {
            tracing::info!("Share {} claimed by {}", share.id, user.id);
        } else {
            // Lost the race; whoever won must have bound the same email
            let current = Self::get_share(db, &share.id).await?;
            if current.shared_with.as_deref() != Some(user.id.as_str()) {
                tracing::debug!("Share {} claimed concurrently by another identity", share.id);
                return Err(AppError::NotFound(INVALID_SHARE.to_string()));
            }
        }

        let share = Self::get_share(db, &share.id).await?;
        Ok((share, guest_credentials))
    }

    /// List shares the actor created or received, with file names; admins
    /// see all shares.
    pub async fn list_share_items(db: &Database, actor: &CurrentUser) -> Result<Vec<ShareListItem>> {
        let items = if actor.is_admin() {
            sqlx::query_as(
                r#"
                SELECT
                  s.id, s.file_id, f.original_name AS file_name,
                  s.shared_with_email, s.permission, s.access_token,
                  s.expires_at, s.created_at
                FROM shares s
                JOIN files f ON s.file_id = f.id
                ORDER BY s.created_at DESC
                "#,
            )
            .fetch_all(db.pool())
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT
                  s.id, s.file_id, f.original_name AS file_name,
                  s.shared_with_email, s.permission, s.access_token,
                  s.expires_at, s.created_at
                FROM shares s
                JOIN files f ON s.file_id = f.id
                WHERE s.created_by = ? OR s.shared_with = ?
                ORDER BY s.created_at DESC
                "#,
            )
            .bind(&actor.id)
            .bind(&actor.id)
            .fetch_all(db.pool())
            .await?
        };

        Ok(items)
    }

    /// Revoke a share by forcing its expiry to now.
    ///
    /// Only the grant's creator or an admin may revoke. Revoking a grant
    /// that is already dead is a no-op success. The row is kept for the
    /// audit trail.
    pub async fn revoke_share(db: &Database, actor: &CurrentUser, share_id: &str) -> Result<()> {
        let share = Self::get_share(db, share_id).await?;

        if share.created_by != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only the share's creator may revoke it".to_string(),
            ));
        }

        let now = Utc::now();
        if share.is_live(now) {
            sqlx::query("UPDATE shares SET expires_at = ? WHERE id = ?")
                .bind(now.to_rfc3339())
                .bind(&share.id)
                .execute(db.pool())
                .await?;
            tracing::info!("Share {} revoked by {}", share.id, actor.id);
        }

        Ok(())
    }
}
