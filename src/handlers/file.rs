use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Json,
};
use bytes::Bytes;

use crate::error::{ApiResponse, AppError, Result};
use crate::models::{CurrentUser, File, FileResponse};
use crate::services::FileService;
use crate::AppState;

/// List files visible to the caller
/// GET /api/v1/files
pub async fn list_files(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>> {
    let files = FileService::list_visible(&state.db, &current_user).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// Upload a file
/// POST /api/v1/files
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let mut data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut client_key: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("file: failed to process multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("file: failed to read: {}", e)))?;
                data = Some(bytes);
            }
            "client_key" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    client_key = Some(text);
                }
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::Validation("file: no file provided".to_string()))?;
    let file_name =
        file_name.ok_or_else(|| AppError::Validation("file: no file name provided".to_string()))?;

    let file = FileService::upload(
        &state.db,
        &state.store,
        &current_user,
        file_name,
        content_type,
        client_key,
        data,
    )
    .await?;

    Ok(Json(ApiResponse::success(file)))
}

/// Get file metadata
/// GET /api/v1/files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>> {
    let (file, access) = FileService::get_if_authorized(&state.db, &current_user, &id).await?;
    let permission = access.as_permission_str().map(|s| s.to_string());
    Ok(Json(ApiResponse::success(FileResponse::new(file, permission))))
}

/// Preview file content inline
/// GET /api/v1/files/:id/preview
pub async fn preview_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response> {
    let (file, data) = FileService::preview(&state.db, &state.store, &current_user, &id).await?;
    content_response(&file, data, "inline")
}

/// Download file content as an attachment
/// GET /api/v1/files/:id/download
pub async fn download_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response> {
    let (file, data) = FileService::download(&state.db, &state.store, &current_user, &id).await?;
    content_response(&file, data, "attachment")
}

/// Delete a file
/// DELETE /api/v1/files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    FileService::delete(&state.db, &state.store, &current_user, &id).await?;
    Ok(Json(ApiResponse::<()>::success_message("File deleted")))
}

fn content_response(file: &File, data: Bytes, disposition: &str) -> Result<Response> {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.mime_type.clone())
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("{}; filename=\"{}\"", disposition, file.original_name),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}
