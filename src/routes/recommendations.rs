use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{FeedbackRecord, GenerateRequest, GenerateResponse, RefreshRequest, RefreshResponse},
    routes::AppState,
};

/// Handler for a fresh Choice-of-Three
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    tracing::info!(
        request_id = %request_id,
        profile_ref = %request.profile_ref,
        occasion = %request.occasion_type,
        "Processing generate request"
    );

    let response = state.pipeline.generate(request).await?;
    Ok(Json(response))
}

/// Handler for a refresh round after rejection
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    tracing::info!(
        request_id = %request_id,
        generation_id = %request.generation_id,
        reason = %request.reason,
        rejected = request.rejected_ids.len(),
        "Processing refresh request"
    );

    let response = state.refresh.refresh(request).await?;
    Ok(Json(response))
}

/// Write-only feedback; accepted once the sink has it
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Json(record): Json<FeedbackRecord>,
) -> AppResult<StatusCode> {
    record.validate()?;
    state.feedback.record(&record).await?;
    Ok(StatusCode::ACCEPTED)
}
