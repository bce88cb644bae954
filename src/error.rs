use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Invalid request body")]
    InvalidBody,
    #[error("Invalid history format")]
    InvalidHistory,
    #[error("Too many requests, please slow down")]
    RateLimited,
    #[error("AI is busy, please try again later")]
    UpstreamOverloaded,
    #[error("{0}")]
    Upstream(String),
    #[error("API Key Missing")]
    MissingApiKey,
    #[error("{0}")]
    Unexpected(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::InvalidBody | AppError::InvalidHistory => StatusCode::BAD_REQUEST,
            AppError::RateLimited | AppError::UpstreamOverloaded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) | AppError::MissingApiKey | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        // 错误信息里的 URL 不外露
        let err = err.without_url();
        tracing::error!("Upstream request failed: {:?}", err);
        AppError::Unexpected(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
