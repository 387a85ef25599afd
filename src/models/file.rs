use serde::Serialize;
use sqlx::FromRow;

/// File model
///
/// `name` is the opaque blob name the encrypted content lives under;
/// `original_name` is what the uploader called it. `encryption_key` is
/// the encoded per-file key and never leaves the server.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct File {
    pub id: String,
    pub owner_id: String,
    #[serde(skip_serializing)]
    pub name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    #[serde(skip_serializing)]
    pub encryption_key: String,
    #[serde(skip_serializing)]
    pub client_key: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// File response with the caller's effective permission attached
#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl FileResponse {
    pub fn new(file: File, permission: Option<String>) -> Self {
        Self {
            id: file.id,
            owner_id: file.owner_id,
            name: file.original_name,
            mime_type: file.mime_type,
            size: file.size,
            permission,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

impl From<File> for FileResponse {
    fn from(file: File) -> Self {
        Self::new(file, None)
    }
}
