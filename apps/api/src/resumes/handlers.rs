use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{ResumeDetail, ResumeSummary};
use crate::resumes::{self, extract, ResumeUpdate};
use crate::state::AppState;

/// POST /api/v1/resumes
/// Multipart body with a single `file` part.
pub async fn handle_upload(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeDetail>), AppError> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {}", e.body_text())))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e.body_text())))?;
        upload = Some((file_name, body));
        break;
    }

    let (file_name, body) =
        upload.ok_or_else(|| AppError::Validation("Missing `file` part".to_string()))?;
    let accepted = state.upload_policy().check(&file_name, body.len())?;

    let detail = resumes::store_resume(
        state.blobs.as_ref(),
        session.id,
        accepted,
        body,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> Result<Json<Vec<ResumeSummary>>, AppError> {
    let resumes = resumes::list_resumes(state.blobs.as_ref(), session.id).await?;
    Ok(Json(resumes))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDetail>, AppError> {
    let detail = resumes::get_resume(state.blobs.as_ref(), session.id, id).await?;
    Ok(Json(detail))
}

/// PUT /api/v1/resumes/:id
/// Renames the file and/or replaces its extracted text.
pub async fn handle_update(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<ResumeUpdate>,
) -> Result<Json<ResumeDetail>, AppError> {
    let detail = resumes::update_resume(
        state.blobs.as_ref(),
        session.id,
        id,
        update,
        &state.upload_policy(),
        Utc::now(),
    )
    .await?;
    Ok(Json(detail))
}

/// GET /api/v1/resumes/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (file_name, body) = resumes::download_resume(state.blobs.as_ref(), session.id, id).await?;
    let content_type = extract::file_extension(&file_name)
        .map(|ext| extract::content_type_for(&ext))
        .unwrap_or("application/octet-stream");
    let ascii_name: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    let disposition = format!("attachment; filename=\"{ascii_name}\"");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    resumes::delete_resume(state.blobs.as_ref(), session.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
