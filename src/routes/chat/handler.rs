use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{ChatRequest, ChatResponse};
use crate::{AppState, cache::fingerprint, error::AppError};

#[axum::debug_handler]
pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    let Some(api_key) = state.config.gemini_api_key.as_deref() else {
        tracing::error!("GEMINI_API_KEY is not configured, rejecting chat request");
        return Err(AppError::MissingApiKey);
    };

    let history = ChatRequest::parse(&body)?.into_history(state.config.history_limit)?;

    let key = fingerprint(&history);
    if let Some(reply) = state.cache.lookup(&key) {
        tracing::debug!("Cache hit for {:?}", key);
        return Ok(Json(ChatResponse::cached(reply)));
    }
    tracing::debug!("Cache miss for {:?}", key);

    // 名额随 permit 离开作用域归还
    let _permit = state.gate.acquire().await?;
    let reply = state.upstream.generate(api_key, &history).await?;

    state.cache.store(key, reply.clone());
    Ok(Json(ChatResponse::generated(reply)))
}

/// 跨域预检
pub async fn preflight() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
