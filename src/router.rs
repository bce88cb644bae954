use axum::{
    Router,
    http::{HeaderValue, header},
    middleware::{from_fn, from_fn_with_state},
    routing::post,
};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer};

use crate::{
    AppState,
    middleware::{handle_panic, log_errors, rate_limit},
    routes::chat,
};

pub const CHAT_PATH: &str = "/api/chat";

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let chat_route = post(chat::chat)
        .options(chat::preflight)
        .fallback(chat::method_not_allowed);

    with_layers(Router::new().route(CHAT_PATH, chat_route), state)
}

// 限流只挂在已匹配的路由上，未知路径不消耗配额
fn with_layers(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .route_layer(from_fn_with_state(state.limiter.clone(), rate_limit))
        .layer(
            // 从外到内：跨域头、5xx 日志、panic 兜底
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_METHODS,
                    HeaderValue::from_static("POST, OPTIONS"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static("Content-Type"),
                ))
                .layer(from_fn(log_errors))
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
        .with_state(state)
}
