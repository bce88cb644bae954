use std::any::Any;

use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::error::AppError;

const MAX_LOGGED_BODY_BYTES: usize = 64 * 1024;

/// 记录所有 5xx 响应及其响应体
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    // 日志里只截取前 64 KiB，返回给客户端的仍是完整响应体
    let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY_BYTES)];
    error!(
        "Server error occurred - {} {} - Status: {}, Body: {}",
        method,
        uri,
        parts.status,
        String::from_utf8_lossy(logged)
    );

    // 重置body以便重新构建响应
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}

/// 处理函数 panic 时的兜底响应，只向客户端返回通用信息
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!("Handler panicked: {}", detail);

    AppError::Unexpected("Internal Server Error".into()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, middleware::from_fn, routing::get};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn oversized_error_body_reaches_the_client_intact() {
        let message = "x".repeat(MAX_LOGGED_BODY_BYTES * 2);
        let expected = message.clone();
        let app = Router::new()
            .route("/", get(move || async move { AppError::Unexpected(message) }))
            .layer(from_fn(log_errors));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], expected);
    }

    #[tokio::test]
    async fn panic_payload_is_not_leaked() {
        let response = handle_panic(Box::new(String::from("secret internal state")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal Server Error");
    }
}
