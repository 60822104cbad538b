use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    services::{FeedbackSink, RecommendationPipeline, RefreshOrchestrator},
};

pub mod recommendations;

/// Shared state handed to every handler
pub struct AppState {
    pub pipeline: Arc<RecommendationPipeline>,
    pub refresh: RefreshOrchestrator,
    pub feedback: Arc<dyn FeedbackSink>,
}

impl AppState {
    pub fn new(pipeline: Arc<RecommendationPipeline>, feedback: Arc<dyn FeedbackSink>) -> Self {
        Self {
            refresh: RefreshOrchestrator::new(Arc::clone(&pipeline)),
            pipeline,
            feedback,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes(state))
        // Layers run bottom-up: the request id must exist before the trace span is built
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/recommendations/generate", post(recommendations::generate))
        .route("/recommendations/refresh", post(recommendations::refresh))
        .route("/recommendations/feedback", post(recommendations::feedback))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
