use std::sync::Arc;
use std::time::Duration;

use crate::cache::keys::rate_limit_key;
use crate::cache::models::RateLimitInfo;
use crate::cache::store::{KeyValueStore, StoreError};
use crate::utils::Clock;

/// 令牌桶限流器
///
/// 不持有任何桶状态，每次判断都在共享存储上以单个原子操作完成，
/// 多个实例共享同一份配额。
#[derive(Clone)]
pub struct TokenBucketLimiter {
    store: KeyValueStore,
    clock: Arc<dyn Clock>,
}

impl TokenBucketLimiter {
    pub fn new(store: KeyValueStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// 尝试为 `subject` 扣减一个令牌，存储故障原样返回
    ///
    /// `limit` 必须不小于 1。
    pub async fn try_acquire(
        &self,
        subject: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitInfo, StoreError> {
        let limit = i64::from(limit);
        let now = self.clock.now();
        let admission = self
            .store
            .take_token(&rate_limit_key(subject), limit, window, now)
            .await?;

        if !admission.allowed {
            tracing::debug!("rate limit exceeded for {}", subject);
        }
        Ok(RateLimitInfo::from_admission(&admission, limit, now))
    }

    /// 存储故障时放行
    pub async fn is_allowed(
        &self,
        subject: &str,
        limit: u32,
        window: Duration,
    ) -> (bool, RateLimitInfo) {
        match self.try_acquire(subject, limit, window).await {
            Ok(info) => (info.allowed, info),
            Err(e) => {
                tracing::warn!("rate limiter store failure for {}, allowing: {}", subject, e);
                (true, RateLimitInfo::fail_open(i64::from(limit), self.clock.now()))
            }
        }
    }
}
