use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::crypto::FileKey;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, File, FileResponse};
use crate::services::{AccessLevel, AccessService};
use crate::storage::EncryptedStore;

/// File service. Owns the registry rows and drives the encrypted store.
pub struct FileService;

impl FileService {
    /// Upload a file: encrypt under a fresh key, persist the blob, then
    /// record the registry row.
    ///
    /// The row is the commit point. If the insert fails the blob is
    /// deleted again, so a key reference never exists without its blob.
    pub async fn upload(
        db: &Database,
        store: &EncryptedStore,
        actor: &CurrentUser,
        original_name: String,
        mime_type: Option<String>,
        client_key: Option<String>,
        data: Bytes,
    ) -> Result<FileResponse> {
        if original_name.is_empty()
            || original_name.contains('/')
            || original_name.contains('\\')
        {
            return Err(AppError::Validation("file: invalid file name".to_string()));
        }

        let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());
        let size = data.len() as i64;

        let key = FileKey::generate();
        let blob_name = store.put(&data, &key).await?;

        let file_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO files (id, owner_id, name, original_name, mime_type, size, encryption_key, client_key, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file_id)
        .bind(&actor.id)
        .bind(&blob_name)
        .bind(&original_name)
        .bind(&mime_type)
        .bind(size)
        .bind(key.encoded())
        .bind(&client_key)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await;

        if let Err(e) = inserted {
            // Roll the blob back; an unreferenced blob must not linger
            if let Err(del_err) = store.delete(&blob_name).await {
                tracing::warn!("Failed to reclaim orphaned blob {}: {}", blob_name, del_err);
            }
            return Err(e.into());
        }

        tracing::info!("Uploaded file {} ({} bytes) for {}", file_id, size, actor.id);

        let file = Self::get_file(db, &file_id).await?;
        Ok(FileResponse::new(file, Some("DOWNLOAD".to_string())))
    }

    /// Get a file by ID
    pub async fn get_file(db: &Database, file_id: &str) -> Result<File> {
        let file: File = sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(file_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        Ok(file)
    }

    /// Look up a file and evaluate the actor's permission in one step.
    ///
    /// Callers never fetch first and check later; the combined form keeps
    /// the check and the use on the same row.
    pub async fn get_if_authorized(
        db: &Database,
        actor: &CurrentUser,
        file_id: &str,
    ) -> Result<(File, AccessLevel)> {
        let file = Self::get_file(db, file_id).await?;
        let access = AccessService::effective_permission(db, actor, &file).await?;

        if !access.can_view() {
            // Authenticated callers may learn the file exists but is not
            // theirs; share tokens never get this far.
            return Err(AppError::Forbidden(
                "You do not have access to this file".to_string(),
            ));
        }

        Ok((file, access))
    }

    /// Read file content for inline preview; any live grant suffices
    pub async fn preview(
        db: &Database,
        store: &EncryptedStore,
        actor: &CurrentUser,
        file_id: &str,
    ) -> Result<(File, Bytes)> {
        let (file, _access) = Self::get_if_authorized(db, actor, file_id).await?;
        let data = Self::read_content(store, &file).await?;
        Ok((file, data))
    }

    /// Read file content for download; requires download permission
    pub async fn download(
        db: &Database,
        store: &EncryptedStore,
        actor: &CurrentUser,
        file_id: &str,
    ) -> Result<(File, Bytes)> {
        let (file, access) = Self::get_if_authorized(db, actor, file_id).await?;

        if !access.can_download() {
            return Err(AppError::Forbidden(
                "Your share permission does not allow downloading".to_string(),
            ));
        }

        let data = Self::read_content(store, &file).await?;
        Ok((file, data))
    }

    async fn read_content(store: &EncryptedStore, file: &File) -> Result<Bytes> {
        let key = FileKey::from_encoded(&file.encryption_key)?;
        store.get(&file.name, &key).await
    }

    /// List files visible to the actor, most recent first.
    ///
    /// Owned files plus files with a live grant bound to the actor;
    /// admins see everything.
    pub async fn list_visible(db: &Database, actor: &CurrentUser) -> Result<Vec<FileResponse>> {
        let files: Vec<File> = if actor.is_admin() {
            sqlx::query_as("SELECT * FROM files ORDER BY created_at DESC")
                .fetch_all(db.pool())
                .await?
        } else {
            let now = Utc::now().to_rfc3339();
            sqlx::query_as(
                r#"
                SELECT DISTINCT f.* FROM files f
                LEFT JOIN shares s
                    ON s.file_id = f.id AND s.shared_with = ? AND s.expires_at > ?
                WHERE f.owner_id = ? OR s.id IS NOT NULL
                ORDER BY f.created_at DESC
                "#,
            )
            .bind(&actor.id)
            .bind(&now)
            .bind(&actor.id)
            .fetch_all(db.pool())
            .await?
        };

        let mut responses = Vec::with_capacity(files.len());
        for file in files {
            let access = AccessService::effective_permission(db, actor, &file).await?;
            let permission = access.as_permission_str().map(|s| s.to_string());
            responses.push(FileResponse::new(file, permission));
        }

        Ok(responses)
    }

    /// Delete a file: registry row first, then best-effort blob removal
    pub async fn delete(
        db: &Database,
        store: &EncryptedStore,
        actor: &CurrentUser,
        file_id: &str,
    ) -> Result<()> {
        let file = Self::get_file(db, file_id).await?;

        if !actor.is_admin() && file.owner_id != actor.id {
            return Err(AppError::Forbidden(
                "Only the owner may delete this file".to_string(),
            ));
        }

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(&file.id)
            .execute(db.pool())
            .await?;

        // Idempotent: a blob already gone does not fail the delete
        if let Err(e) = store.delete(&file.name).await {
            tracing::warn!("Failed to delete blob {} for file {}: {}", file.name, file.id, e);
        }

        tracing::info!("Deleted file {} ({})", file.id, file.original_name);
        Ok(())
    }
}
