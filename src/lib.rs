use std::sync::Arc;

use admission::AdmissionGate;
use cache::ResponseCache;
use config::Config;
use middleware::RateLimiter;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use upstream::GeminiClient;

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;
pub mod upstream;
pub mod utils;

/// 进程级共享状态，启动时构建一次，通过 axum `State` 注入
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResponseCache>,
    pub gate: AdmissionGate,
    pub upstream: GeminiClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            limiter: Arc::new(RateLimiter::from_config(&config)),
            cache: Arc::new(ResponseCache::new(
                config.cache_ttl(),
                config.cache_max_entries,
            )),
            gate: AdmissionGate::new(config.max_concurrent),
            upstream: GeminiClient::new(&config)?,
            config: Arc::new(config),
        })
    }
}

/// 定期清理过期的限流记录和缓存条目
pub fn spawn_sweeper(state: &AppState) -> JoinHandle<()> {
    let limiter = state.limiter.clone();
    let cache = state.cache.clone();
    let period = state.config.sweep_interval();

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let clients = limiter.sweep();
            let entries = cache.sweep();
            tracing::debug!(
                clients,
                entries,
                tracked_clients = limiter.len(),
                cached_entries = cache.len(),
                "Swept stale state"
            );
        }
    })
}
