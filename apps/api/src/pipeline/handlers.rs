//! Axum route handlers for the render and export API.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::resume::ResumeRecord;
use crate::pipeline::{RenderOptions, RenderResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default = "default_preview")]
    pub preview: bool,
}

fn default_preview() -> bool {
    true
}

/// Body extraction failures become our structured 400 rather than axum's plain-text one.
fn parse_record(
    payload: Result<Json<ResumeRecord>, JsonRejection>,
) -> Result<ResumeRecord, AppError> {
    payload.map(|Json(record)| record).map_err(|rejection| {
        AppError::InvalidInput(format!("Invalid request body: {}", rejection.body_text()))
    })
}

fn parse_preview(query: Result<Query<PreviewQuery>, QueryRejection>) -> Result<bool, AppError> {
    query.map(|Query(q)| q.preview).map_err(|rejection| {
        AppError::InvalidInput(format!("Invalid query string: {}", rejection.body_text()))
    })
}

/// POST /api/generate-pdf
///
/// Renders the CV to PDF. Returns the download link and, unless
/// `?preview=false`, the PDF inline as base64.
pub async fn handle_generate_pdf(
    State(state): State<AppState>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
    payload: Result<Json<ResumeRecord>, JsonRejection>,
) -> Result<Json<RenderResult>, AppError> {
    let include_preview = parse_preview(query)?;
    let record = parse_record(payload)?;
    let options = RenderOptions { include_preview };

    let result = state.pipeline.render(&record, options).await?;
    Ok(Json(result))
}

/// POST /api/export-json
pub async fn handle_export_json(
    State(state): State<AppState>,
    payload: Result<Json<ResumeRecord>, JsonRejection>,
) -> Result<Json<RenderResult>, AppError> {
    let record = parse_record(payload)?;

    let result = state.pipeline.export_json(&record).await?;
    Ok(Json(result))
}
