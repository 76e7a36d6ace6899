//! 共享键值存储
//!
//! `KeyValueStore` 是限流桶和实体缓存唯一的状态来源。所有操作都返回
//! `Result`，`Ok(None)` 表示未命中，`Err` 表示后端故障，是否放行由调用方决定。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::cache::models::Admission;

pub mod memory;
pub mod redis_backend;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("key `{0}` holds a value of the wrong type")]
    WrongType(String),
}

/// 键值存储后端
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// 返回键是否存在过；删除不存在的键不是错误
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// 原子地完成读取、补充、扣减和写回
    ///
    /// 准入时以 `window` 重置桶的过期时间；拒绝时不修改存储。
    async fn take_token(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        now: i64,
    ) -> Result<Admission, StoreError>;
}

/// 带超时的存储句柄
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn StoreBackend>,
    timeout: Duration,
}

impl KeyValueStore {
    pub fn new(backend: Arc<dyn StoreBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded(self.backend.get(key)).await
    }

    pub async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.bounded(self.backend.set_ex(key, value, ttl)).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded(self.backend.delete(key)).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded(self.backend.exists(key)).await
    }

    pub async fn take_token(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        now: i64,
    ) -> Result<Admission, StoreError> {
        self.bounded(self.backend.take_token(key, limit, window, now))
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.set(key, json, ttl).await
    }
}
