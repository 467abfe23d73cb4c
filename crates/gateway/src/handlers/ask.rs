//! Query handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use routeforge_common::{
    errors::{AppError, Result},
    AnswerResponse,
};

/// Ask request
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: Option<String>,
}

/// Route a query and answer it
pub async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation {
        message: e.body_text(),
        field: None,
    })?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let query = request
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::MissingField {
            field: "query".to_string(),
        })?;

    Ok(Json(state.engine.ask(&query).await))
}
