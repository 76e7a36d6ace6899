use serde::{Deserialize, Serialize};

/// 令牌桶状态，存储在共享键值存储中
///
/// `tokens` 始终满足 `0 <= tokens <= limit`，`last_refill` 为 Unix 时间戳（秒），
/// 对同一个键单调不减。
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucket {
    pub tokens: i64,
    pub last_refill: i64,
}

/// 一次准入判断的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    /// 补充（以及准入时扣减）之后的令牌数
    pub tokens: i64,
    /// 准入时需要写回的新状态；拒绝时不写
    pub updated: Option<TokenBucket>,
}

impl TokenBucket {
    /// 新桶视为满桶
    pub fn full(limit: i64, now: i64) -> Self {
        Self {
            tokens: limit,
            last_refill: now,
        }
    }

    /// 按经过的秒数补充令牌，每秒一个，不超过 `limit`
    pub fn refilled(self, limit: i64, now: i64) -> Self {
        let elapsed = (now - self.last_refill).max(0);
        let tokens = self.tokens.clamp(0, limit);
        Self {
            tokens: tokens.saturating_add(elapsed).min(limit),
            last_refill: self.last_refill.max(now),
        }
    }

    /// 补充后尝试扣减一个令牌
    ///
    /// Redis 后端的 Lua 脚本与此函数逐行对应，修改时需同步。
    pub fn admit(existing: Option<TokenBucket>, limit: i64, now: i64) -> Admission {
        let bucket = existing
            .unwrap_or_else(|| TokenBucket::full(limit, now))
            .refilled(limit, now);

        if bucket.tokens > 0 {
            let updated = TokenBucket {
                tokens: bucket.tokens - 1,
                last_refill: bucket.last_refill,
            };
            Admission {
                allowed: true,
                tokens: updated.tokens,
                updated: Some(updated),
            }
        } else {
            Admission {
                allowed: false,
                tokens: bucket.tokens,
                updated: None,
            }
        }
    }
}

/// 返回给调用方的配额信息
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub allowed: bool,
    pub limit: i64,
    pub tokens_remaining: i64,
    /// 客户端退避提示，Unix 时间戳（秒）
    pub reset_time: i64,
}

impl RateLimitInfo {
    pub fn from_admission(admission: &Admission, limit: i64, now: i64) -> Self {
        let tokens_remaining = if admission.allowed { admission.tokens } else { 0 };
        Self {
            allowed: admission.allowed,
            limit,
            tokens_remaining,
            reset_time: now + (limit - admission.tokens),
        }
    }

    /// 存储故障时放行使用的配额信息
    pub fn fail_open(limit: i64, now: i64) -> Self {
        Self {
            allowed: true,
            limit,
            tokens_remaining: limit,
            reset_time: now,
        }
    }
}
