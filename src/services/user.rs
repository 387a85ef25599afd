use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{User, UserResponse, UserRole};
use crate::services::AuthService;

/// Length of generated guest passwords
const GUEST_PASSWORD_LEN: usize = 20;

/// User service. The identity store behind authentication, sharing and
/// guest provisioning.
pub struct UserService;

impl UserService {
    /// Get user by ID
    pub async fn get_user(db: &Database, user_id: &str) -> Result<User> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    /// Get user profile
    pub async fn get_profile(db: &Database, user_id: &str) -> Result<UserResponse> {
        let user = Self::get_user(db, user_id).await?;
        Ok(UserResponse::from(user))
    }

    /// Find a user by email, case-insensitively
    pub async fn find_by_email(db: &Database, email: &str) -> Result<Option<User>> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
                .bind(email)
                .fetch_optional(db.pool())
                .await?;

        Ok(user)
    }

    /// Resolve the identity behind an email, provisioning a guest account
    /// if none exists yet.
    ///
    /// Returns the generated plaintext password only when this call
    /// created the account; concurrent callers racing on the same email
    /// converge on one row via the unique email index, and exactly one of
    /// them sees the password.
    pub async fn find_or_create_guest(
        db: &Database,
        email: &str,
    ) -> Result<(User, Option<String>)> {
        if let Some(user) = Self::find_by_email(db, email).await? {
            return Ok((user, None));
        }

        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GUEST_PASSWORD_LEN)
            .map(char::from)
            .collect();
        let password_hash = AuthService::hash_password(&password)?;

        let base = Self::username_base(email);
        let now = Utc::now().to_rfc3339();

        // Derive a free username from the email local part, appending a
        // numeric suffix on collision.
        for attempt in 0..50u32 {
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                format!("{}{}", base, attempt)
            };

            let user_id = Uuid::new_v4().to_string();
            let result = sqlx::query(
                r#"
                INSERT INTO users (id, username, email, name, password_hash, role, created_at, updated_at)
                VALUES (?, ?, ?, '', ?, ?, ?, ?)
                "#,
            )
            .bind(&user_id)
            .bind(&candidate)
            .bind(email)
            .bind(&password_hash)
            .bind(UserRole::Guest.as_str())
            .bind(&now)
            .bind(&now)
            .execute(db.pool())
            .await;

            match result {
                Ok(_) => {
                    let user = Self::get_user(db, &user_id).await?;
                    tracing::info!("Provisioned guest account {} for {}", user.username, email);
                    return Ok((user, Some(password)));
                }
                Err(e) => {
                    let message = match &e {
                        sqlx::Error::Database(db_err) => db_err.message().to_string(),
                        _ => return Err(e.into()),
                    };
                    if message.contains("users.username") {
                        continue;
                    }
                    if message.contains("idx_users_email") {
                        // Lost a provisioning race; the winner's row is ours too
                        let user = Self::find_by_email(db, email).await?.ok_or_else(|| {
                            AppError::Internal("Guest account vanished after insert conflict".to_string())
                        })?;
                        return Ok((user, None));
                    }
                    return Err(e.into());
                }
            }
        }

        Err(AppError::Internal(format!(
            "Could not derive a free username for {}",
            email
        )))
    }

    fn username_base(email: &str) -> String {
        let local = email.split('@').next().unwrap_or("");
        let base: String = local
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            .collect();

        if base.is_empty() {
            "guest".to_string()
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_base_strips_domain_and_junk() {
        assert_eq!(UserService::username_base("Jane.Doe@example.com"), "jane.doe");
        assert_eq!(UserService::username_base("a+b@example.com"), "ab");
        assert_eq!(UserService::username_base("@example.com"), "guest");
    }
}
