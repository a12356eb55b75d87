use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Poster cache error: {0}")]
    Cache(#[from] cacache::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    /// Every candidate pool of a ranking pass came back empty-handed
    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("No AI provider configured")]
    ProviderNotConfigured,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Client-side mistakes (bad input, unknown ids, undecodable images) are
    /// answered immediately; everything touching the network is retryable.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::HttpClient(e) => !e.status().is_some_and(|s| s.is_client_error()),
            AppError::ExternalApi(_) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Image(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::Cache(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) | AppError::SearchFailed(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::ProviderNotConfigured => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        let response = AppError::InvalidInput("Description is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_search_failed_maps_to_bad_gateway() {
        let response = AppError::SearchFailed("all pools failed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::ExternalApi("503".to_string()).is_transient());
        assert!(!AppError::InvalidInput("empty".to_string()).is_transient());
        assert!(!AppError::NotFound("42".to_string()).is_transient());
    }
}
