use bytes::Bytes;

use sealdrop::config::Config;
use sealdrop::db::Database;
use sealdrop::models::{CreateShareRequest, CreateUserRequest, CurrentUser, FileResponse};
use sealdrop::services::{AuthService, FileService, UserService};
use sealdrop::storage::{EncryptedStore, LocalStorage};

/// Everything a test needs: a migrated database and an encrypted store,
/// both backed by a temp directory, plus a seeded admin (the first
/// registered account).
pub struct TestEnv {
    pub db: Database,
    pub store: EncryptedStore,
    pub config: Config,
    pub admin: CurrentUser,
    _tmp: tempfile::TempDir,
}

pub async fn setup() -> TestEnv {
    let tmp = tempfile::tempdir().expect("create temp dir");

    let db_path = tmp.path().join("test.db");
    let db = Database::new(db_path.to_str().unwrap())
        .await
        .expect("open database");
    db.run_migrations().await.expect("run migrations");

    let store = EncryptedStore::new(Box::new(LocalStorage::new(tmp.path().join("blobs"))));

    let admin = register_user(&db, "root", "root@example.com").await;

    TestEnv {
        db,
        store,
        config: Config::default(),
        admin,
        _tmp: tmp,
    }
}

pub async fn register_user(db: &Database, username: &str, email: &str) -> CurrentUser {
    AuthService::register(
        db,
        CreateUserRequest {
            username: username.to_string(),
            email: email.to_string(),
            name: username.to_string(),
            password: "correct horse battery".to_string(),
        },
    )
    .await
    .expect("register user");

    current_user(db, email).await
}

/// Build a CurrentUser from the stored row, the way the auth middleware
/// would after validating a token.
pub async fn current_user(db: &Database, email: &str) -> CurrentUser {
    let user = UserService::find_by_email(db, email)
        .await
        .expect("query user")
        .expect("user exists");

    let role = user.get_role();
    CurrentUser {
        id: user.id,
        email: user.email,
        role,
    }
}

pub async fn upload_sample(env: &TestEnv, actor: &CurrentUser, data: &[u8]) -> FileResponse {
    FileService::upload(
        &env.db,
        &env.store,
        actor,
        "report.pdf".to_string(),
        Some("application/pdf".to_string()),
        None,
        Bytes::copy_from_slice(data),
    )
    .await
    .expect("upload file")
}

pub fn share_req(
    file_id: &str,
    email: &str,
    permission: &str,
    expires_in_minutes: i64,
) -> CreateShareRequest {
    CreateShareRequest {
        file_id: file_id.to_string(),
        shared_with_email: email.to_string(),
        permission: permission.to_string(),
        expires_in_minutes,
    }
}

/// Backdate a share so it reads as expired
pub async fn force_expire(db: &Database, share_id: &str) {
    let past = (chrono::Utc::now() - chrono::Duration::minutes(5)).to_rfc3339();
    sqlx::query("UPDATE shares SET expires_at = ? WHERE id = ?")
        .bind(&past)
        .bind(share_id)
        .execute(db.pool())
        .await
        .expect("backdate share");
}
