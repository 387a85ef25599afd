use chrono::Utc;

use crate::db::Database;
use crate::error::Result;
use crate::models::{CurrentUser, File, SharePermission};

/// Effective permission of an actor on a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Owner or admin: full access including share management
    Owner,
    /// Live share with download permission
    Download,
    /// Live share with view-only permission
    View,
    /// No access
    Denied,
}

impl AccessLevel {
    /// Metadata and inline preview
    pub fn can_view(&self) -> bool {
        !matches!(self, AccessLevel::Denied)
    }

    /// Raw content download
    pub fn can_download(&self) -> bool {
        matches!(self, AccessLevel::Owner | AccessLevel::Download)
    }

    /// Creating and revoking shares on the file
    pub fn can_manage_shares(&self) -> bool {
        matches!(self, AccessLevel::Owner)
    }

    /// Permission string reported to the caller, if any
    pub fn as_permission_str(&self) -> Option<&'static str> {
        match self {
            AccessLevel::Owner | AccessLevel::Download => Some("DOWNLOAD"),
            AccessLevel::View => Some("VIEW"),
            AccessLevel::Denied => None,
        }
    }
}

/// Access control evaluator
///
/// The single place the (actor, file) -> permission rule lives. List and
/// get paths both go through it so visibility cannot drift between them.
pub struct AccessService;

impl AccessService {
    /// Compute the actor's effective permission on a file.
    ///
    /// Precedence: admin, then ownership, then the strongest live share
    /// bound to the actor.
    pub async fn effective_permission(
        db: &Database,
        actor: &CurrentUser,
        file: &File,
    ) -> Result<AccessLevel> {
        if actor.is_admin() || file.owner_id == actor.id {
            return Ok(AccessLevel::Owner);
        }

        let now = Utc::now().to_rfc3339();
        let permissions: Vec<(String,)> = sqlx::query_as(
            "SELECT permission FROM shares WHERE file_id = ? AND shared_with = ? AND expires_at > ?",
        )
        .bind(&file.id)
        .bind(&actor.id)
        .bind(&now)
        .fetch_all(db.pool())
        .await?;

        let mut level = AccessLevel::Denied;
        for (permission,) in permissions {
            match SharePermission::parse(&permission) {
                Ok(SharePermission::Download) => return Ok(AccessLevel::Download),
                Ok(SharePermission::View) => level = AccessLevel::View,
                Err(_) => {}
            }
        }

        Ok(level)
    }

    /// Visibility predicate shared by list and get paths
    pub async fn is_visible(db: &Database, actor: &CurrentUser, file: &File) -> Result<bool> {
        Ok(Self::effective_permission(db, actor, file)
            .await?
            .can_view())
    }
}
