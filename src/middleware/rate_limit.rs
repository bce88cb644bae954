use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{config::Config, error::AppError, utils::client_id};

/// 单个客户端的固定窗口计数
#[derive(Debug, Clone, Copy)]
pub struct ClientWindow {
    pub count: u32,
    pub window_start: Instant,
}

/// 按客户端的固定窗口限流器（非滑动窗口）
///
/// 窗口边界附近的突发最多可放行 `2 × max_requests` 次请求。
pub struct RateLimiter {
    clients: Mutex<HashMap<String, ClientWindow>>,
    max_requests: u32,
    window: Duration,
    max_clients: usize,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, max_clients: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_requests,
            window,
            max_clients: max_clients.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_requests,
            config.rate_limit_window(),
            config.rate_limit_max_clients,
        )
    }

    pub fn allow(&self, client_id: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients();

        if let Some(record) = clients.get_mut(client_id) {
            if now.duration_since(record.window_start) > self.window {
                *record = ClientWindow {
                    count: 1,
                    window_start: now,
                };
                return true;
            }
            record.count = record.count.saturating_add(1);
            return record.count <= self.max_requests;
        }

        if clients.len() >= self.max_clients {
            self.make_room(&mut clients, now);
        }
        clients.insert(
            client_id.to_string(),
            ClientWindow {
                count: 1,
                window_start: now,
            },
        );
        self.max_requests >= 1
    }

    /// 删除窗口已结束的记录，返回删除数量
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|_, record| now.duration_since(record.window_start) <= self.window);
        before - clients.len()
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_room(&self, clients: &mut HashMap<String, ClientWindow>, now: Instant) {
        clients.retain(|_, record| now.duration_since(record.window_start) <= self.window);

        while clients.len() >= self.max_clients {
            let oldest = clients
                .iter()
                .min_by_key(|(_, record)| record.window_start)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    tracing::debug!("Rate limiter full, evicting client {}", id);
                    clients.remove(&id);
                }
                None => break,
            }
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, ClientWindow>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 只对 POST 计数；OPTIONS 与 405 不消耗额度
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }

    let client = client_id(&req);
    if !limiter.allow(&client) {
        tracing::warn!("Rate limit exceeded for client {}", client);
        return AppError::RateLimited.into_response();
    }

    let span = tracing::info_span!("chat", client = %client, request_id = %Uuid::new_v4());
    next.run(req).instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn cap_is_allowed_and_next_is_rejected() {
        let limiter = RateLimiter::new(20, WINDOW, 100);

        for _ in 0..20 {
            assert!(limiter.allow("1.2.3.4"));
        }
        assert!(!limiter.allow("1.2.3.4"));
        assert!(!limiter.allow("1.2.3.4"));
    }

    #[tokio::test(start_paused = true)]
    async fn counting_restarts_after_window() {
        let limiter = RateLimiter::new(2, WINDOW, 100);
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        // 恰好等于窗口长度时仍在原窗口内
        advance(WINDOW).await;
        assert!(!limiter.allow("a"));

        advance(Duration::from_millis(1)).await;
        assert!(limiter.allow("a"));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn clients_are_isolated() {
        let limiter = RateLimiter::new(1, WINDOW, 100);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_elapsed_windows() {
        let limiter = RateLimiter::new(5, WINDOW, 100);
        limiter.allow("old");
        advance(Duration::from_secs(30)).await;
        limiter.allow("fresh");
        advance(Duration::from_secs(31)).await;

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tracked_clients_never_exceed_capacity() {
        let limiter = RateLimiter::new(5, WINDOW, 3);
        for i in 0..10 {
            assert!(limiter.allow(&format!("client-{i}")));
            advance(Duration::from_secs(1)).await;
            assert!(limiter.len() <= 3);
        }
        // 最早的客户端被淘汰，最新的保留计数
        assert!(limiter.allow("client-9"));
        assert_eq!(limiter.len(), 3);
    }

    #[tokio::test]
    async fn concurrent_callers_never_over_admit() {
        let limiter = Arc::new(RateLimiter::new(50, WINDOW, 100));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                (0..20).filter(|_| limiter.allow("shared")).count()
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 50);
    }
}
