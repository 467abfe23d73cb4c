//! Document upload handler
//!
//! Accepts already-extracted page texts, indexes them, and starts the
//! document session.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use routeforge_common::errors::{AppError, Result};

/// Upload request
#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(length(min = 1, max = 255))]
    pub filename: String,

    /// Text of each page, in order
    #[validate(length(min = 1))]
    pub pages: Vec<String>,
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub document_id: String,
    pub chunks: usize,
}

/// Index an uploaded document
pub async fn upload_document(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();

    let Json(request) = payload.map_err(|e| AppError::Validation {
        message: e.body_text(),
        field: None,
    })?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let report = match state
        .engine
        .upload_document(&request.filename, request.pages)
        .await
    {
        Ok(report) => report,
        Err(e @ AppError::Validation { .. }) => return Err(e),
        Err(e) => {
            tracing::error!(error = %e, filename = %request.filename, "Document indexing failed");
            return Err(AppError::Indexing {
                message: "Failed to process the document.".to_string(),
            });
        }
    };

    tracing::info!(
        filename = %request.filename,
        document_id = %report.document_id,
        chunks = report.chunks,
        latency_ms = start.elapsed().as_millis() as u64,
        "Document uploaded"
    );

    Ok(Json(UploadResponse {
        message: format!("File '{}' processed successfully.", request.filename),
        document_id: report.document_id,
        chunks: report.chunks,
    }))
}
