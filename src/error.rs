use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Every provider failed or returned nothing
    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    /// The dislike veto removed the entire candidate pool
    #[error("Every candidate was excluded by the profile's dislikes")]
    FilterExhaustion,

    /// A single provider exceeded its deadline; absorbed by the aggregator
    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    ProviderTimeout {
        provider: &'static str,
        timeout_ms: u64,
    },

    /// Fewer than three candidates and the caller asked for a full triple
    #[error("Only {found} of 3 recommendations could be confirmed")]
    PartialResult { found: usize },

    #[error("None of the selected recommendations are currently available")]
    NoLiveCandidates,

    /// Another refresh of the same session held its lock for too long
    #[error("Session {0} is busy with another refresh")]
    SessionBusy(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => "internal_error",
            AppError::HttpClient(_) | AppError::ExternalApi(_) => "upstream_error",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Aggregation(_) => "aggregation_error",
            AppError::FilterExhaustion => "filter_exhaustion",
            AppError::ProviderTimeout { .. } => "provider_timeout",
            AppError::PartialResult { .. } => "partial_result",
            AppError::NoLiveCandidates => "no_live_candidates",
            AppError::SessionBusy(_) => "session_busy",
            AppError::Classification(_) => "classification_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Raw infrastructure errors are logged here and never echoed to the client
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Aggregation(_) => (
                StatusCode::BAD_GATEWAY,
                "We couldn't find recommendations right now. Please try again shortly.".to_string(),
            ),
            AppError::FilterExhaustion => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Nothing matched these preferences. Try adjusting your preferences.".to_string(),
            ),
            AppError::PartialResult { .. } => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::NoLiveCandidates => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::SessionBusy(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::ProviderTimeout { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, self.to_string())
            }
            AppError::HttpClient(_) | AppError::ExternalApi(_) | AppError::Classification(_) => {
                tracing::error!(error = %self, "Upstream failure surfaced to client");
                (
                    StatusCode::BAD_GATEWAY,
                    "An upstream service failed. Please try again.".to_string(),
                )
            }
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Internal failure surfaced to client");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
