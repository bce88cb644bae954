//! 上游调用的并发闸门。
//!
//! 用计数信号量限制同时进行的上游请求数。等待者在许可释放时被唤醒，
//! 按先来先到的顺序放行。许可随 [`AdmissionPermit`] 的 drop 归还，
//! 因此正常返回、`?` 提前返回、panic 展开以及 future 被取消时都会释放。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

#[derive(Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    limit: usize,
}

/// 占用一个上游并发名额，drop 时释放
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub async fn acquire(&self) -> Result<AdmissionPermit, AppError> {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!(
                    in_flight = self.in_flight(),
                    limit = self.limit,
                    "Upstream slots busy, queueing"
                );
                self.permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| AppError::Unexpected("admission gate closed".into()))?
            }
        };

        Ok(AdmissionPermit { _permit: permit })
    }

    pub fn in_flight(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
