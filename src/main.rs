use std::error::Error;
use std::net::{IpAddr, SocketAddr};

use chat_gateway::{AppState, config::Config, router::create_router, spawn_sweeper};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env()?;
    if config.gemini_api_key.is_none() {
        tracing::error!("GEMINI_API_KEY is not set; every chat request will fail with 500");
    }
    tracing::info!(
        window_secs = config.rate_limit_window_secs,
        max_requests = config.rate_limit_requests,
        cache_ttl_secs = config.cache_ttl_secs,
        max_concurrent = config.max_concurrent,
        history_limit = config.history_limit,
        upstream_timeout_secs = ?config.upstream_timeout_secs,
        "Gateway configured"
    );

    let state = AppState::new(config)?;
    spawn_sweeper(&state);

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
