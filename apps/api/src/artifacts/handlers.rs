//! Axum route handlers for artifact downloads.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::artifacts::{ArtifactId, ArtifactKind, StoreError};
use crate::errors::AppError;
use crate::state::AppState;

/// GET /download-pdf/:id
pub async fn handle_download_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    download(&state, &id, ArtifactKind::Document).await
}

/// GET /download-json/:id
pub async fn handle_download_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    download(&state, &id, ArtifactKind::DataExport).await
}

/// Streams a stored artifact back as an attachment.
///
/// Malformed ids, evicted ids, and ids of the other kind all produce the same
/// 404 so a probe learns nothing about what exists.
async fn download(state: &AppState, raw_id: &str, kind: ArtifactKind) -> Result<Response, AppError> {
    let not_found = || AppError::NotFound("File not found or expired".to_string());

    let id: ArtifactId = raw_id.parse().map_err(|_| not_found())?;

    let artifact = match state.store.get(id).await {
        Ok(artifact) => artifact,
        Err(StoreError::NotFound) => return Err(not_found()),
        Err(e) => return Err(AppError::Internal(e.into())),
    };

    if artifact.kind != kind {
        return Err(not_found());
    }

    debug!(
        "Serving artifact {} ({} bytes, stored {})",
        artifact.id,
        artifact.bytes.len(),
        artifact.created_at.to_rfc3339()
    );

    let disposition = format!("attachment; filename=\"{}\"", kind.download_filename());

    Ok((
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}
