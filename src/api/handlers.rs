use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::{MediaType, ProgressRecord};

use super::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Current continue-watching list, most recent first
pub async fn list_continue_watching(State(state): State<AppState>) -> Json<Vec<ProgressRecord>> {
    Json(state.continue_watching.list().await)
}

/// Removes a title from continue watching
pub async fn remove_progress(
    State(state): State<AppState>,
    Path((media_type, media_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let media_type: MediaType = media_type.parse()?;

    if state
        .continue_watching
        .remove_progress(media_type, &media_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "No progress stored for {} {}",
            media_type, media_id
        )))
    }
}

/// Stores progress reported by an embedded player
pub async fn record_progress(
    State(state): State<AppState>,
    Path((media_type, media_id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> AppResult<StatusCode> {
    let media_type: MediaType = media_type.parse()?;

    state
        .continue_watching
        .record_progress(media_type, &media_id, &payload)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
