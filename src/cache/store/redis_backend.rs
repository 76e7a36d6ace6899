use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, Script};

use super::{StoreBackend, StoreError};
use crate::cache::models::{Admission, TokenBucket};

/// 令牌桶的原子操作，与 `TokenBucket::admit` 保持一致
///
/// KEYS[1] 桶键；ARGV[1] limit，ARGV[2] window（秒），ARGV[3] now（秒）。
/// 返回 {allowed, tokens, last_refill}。
const TAKE_TOKEN_SCRIPT: &str = r#"
local limit = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local state = redis.call("HMGET", KEYS[1], "tokens", "last_refill")
local tokens = tonumber(state[1])
local last_refill = tonumber(state[2])

if tokens == nil or last_refill == nil then
    tokens = limit
    last_refill = now
end

local elapsed = now - last_refill
if elapsed < 0 then
    elapsed = 0
end
if tokens < 0 then
    tokens = 0
end
tokens = math.min(limit, tokens + elapsed)
last_refill = math.max(last_refill, now)

if tokens > 0 then
    tokens = tokens - 1
    redis.call("HSET", KEYS[1], "tokens", tokens, "last_refill", last_refill)
    redis.call("EXPIRE", KEYS[1], window)
    return {1, tokens, last_refill}
end

return {0, tokens, last_refill}
"#;

/// 基于 Redis 的共享存储后端
pub struct RedisBackend {
    client: RedisClient,
    take_token_script: Script,
}

impl RedisBackend {
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            take_token_script: Script::new(TAKE_TOKEN_SCRIPT),
        }
    }

    pub fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(RedisClient::open(url)?))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl StoreBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn take_token(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        now: i64,
    ) -> Result<Admission, StoreError> {
        let mut conn = self.connection().await?;
        let (allowed, tokens, last_refill): (i64, i64, i64) = self
            .take_token_script
            .key(key)
            .arg(limit)
            .arg(window.as_secs().max(1))
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        let allowed = allowed == 1;
        Ok(Admission {
            allowed,
            tokens,
            updated: allowed.then_some(TokenBucket {
                tokens,
                last_refill,
            }),
        })
    }
}

/// 需要真实的 Redis，未设置 `REDIS_URL` 时跳过，例如
/// `REDIS_URL=redis://127.0.0.1:6379/15 cargo test redis_backend`
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);
    const NOW: i64 = 1_700_000_000;

    fn redis_url() -> Option<String> {
        match std::env::var("REDIS_URL") {
            Ok(url) => Some(url),
            Err(_) => {
                eprintln!("REDIS_URL not set, skipping redis backend test");
                None
            }
        }
    }

    async fn setup() -> Option<(RedisBackend, redis::aio::MultiplexedConnection, String)> {
        let backend = RedisBackend::open(&redis_url()?).unwrap();
        let conn = backend.connection().await.unwrap();
        let key = format!("gatekeeper_test:{}", uuid::Uuid::new_v4().simple());
        Some((backend, conn, key))
    }

    async fn bucket_hash(
        conn: &mut redis::aio::MultiplexedConnection,
        key: &str,
    ) -> HashMap<String, String> {
        conn.hgetall(key).await.unwrap()
    }

    #[tokio::test]
    async fn ten_admissions_then_denial() {
        let Some((backend, mut conn, key)) = setup().await else {
            return;
        };

        for expected in (0..10).rev() {
            let admission = backend.take_token(&key, 10, WINDOW, NOW).await.unwrap();
            assert!(admission.allowed);
            assert_eq!(admission.tokens, expected);
        }

        let denied = backend.take_token(&key, 10, WINDOW, NOW).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.tokens, 0);
        assert!(denied.updated.is_none());

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    async fn elapsed_seconds_refill_tokens() {
        let Some((backend, mut conn, key)) = setup().await else {
            return;
        };
        for _ in 0..10 {
            backend.take_token(&key, 10, WINDOW, NOW).await.unwrap();
        }

        let refilled = backend.take_token(&key, 10, WINDOW, NOW + 5).await.unwrap();
        assert!(refilled.allowed);
        assert_eq!(refilled.tokens, 4);

        let hash = bucket_hash(&mut conn, &key).await;
        assert_eq!(hash["tokens"], "4");
        assert_eq!(hash["last_refill"], (NOW + 5).to_string());

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    async fn denial_leaves_bucket_untouched() {
        let Some((backend, mut conn, key)) = setup().await else {
            return;
        };
        for _ in 0..3 {
            backend.take_token(&key, 3, WINDOW, NOW).await.unwrap();
        }
        let _: bool = conn.expire(&key, 30).await.unwrap();
        let before = bucket_hash(&mut conn, &key).await;

        let denied = backend.take_token(&key, 3, WINDOW, NOW).await.unwrap();
        assert!(!denied.allowed);

        assert_eq!(bucket_hash(&mut conn, &key).await, before);
        // 拒绝不顺延过期时间
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((1..=30).contains(&ttl), "ttl {}", ttl);

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    async fn each_admission_resets_expiry_to_window() {
        let Some((backend, mut conn, key)) = setup().await else {
            return;
        };
        backend.take_token(&key, 10, WINDOW, NOW).await.unwrap();
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((59..=60).contains(&ttl), "ttl {}", ttl);

        let _: bool = conn.expire(&key, 5).await.unwrap();
        backend.take_token(&key, 10, WINDOW, NOW + 1).await.unwrap();
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((59..=60).contains(&ttl), "ttl {}", ttl);

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    async fn text_key_fails_token_take() {
        let Some((backend, mut conn, key)) = setup().await else {
            return;
        };
        let _: () = conn.set(&key, "not a bucket").await.unwrap();

        assert!(matches!(
            backend.take_token(&key, 10, WINDOW, NOW).await,
            Err(StoreError::Redis(_))
        ));

        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    async fn text_values_expire_and_delete() {
        let Some((backend, mut conn, key)) = setup().await else {
            return;
        };
        backend
            .set_ex(&key, "cached".into(), Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(backend.get(&key).await.unwrap(), Some("cached".to_string()));
        assert!(backend.exists(&key).await.unwrap());
        let ttl: i64 = conn.ttl(&key).await.unwrap();
        assert!((299..=300).contains(&ttl), "ttl {}", ttl);

        assert!(backend.delete(&key).await.unwrap());
        assert!(!backend.delete(&key).await.unwrap());
        assert_eq!(backend.get(&key).await.unwrap(), None);
    }
}
