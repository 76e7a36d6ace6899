use std::sync::Arc;

use cache::{EntityCache, KeyValueStore, MemoryBackend, RedisBackend, StoreBackend, StoreError};
use config::{Config, StoreBackendKind};
use database::UserRepository;
use utils::Clock;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod result;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: UserRepository,
    pub user_cache: EntityCache,
}

impl AppState {
    pub fn new(config: Config, store: KeyValueStore) -> Self {
        let user_cache = EntityCache::new(store, config.cache_ttl());
        Self {
            config,
            users: UserRepository::new(),
            user_cache,
        }
    }
}

/// 按配置创建共享存储
///
/// Redis 客户端只解析地址，不在此处建立连接，后端不可达时服务照常启动。
pub fn open_store(config: &Config, clock: Arc<dyn Clock>) -> Result<KeyValueStore, StoreError> {
    let backend: Arc<dyn StoreBackend> = match config.store_backend {
        StoreBackendKind::Redis => Arc::new(RedisBackend::open(&config.store_url())?),
        StoreBackendKind::Memory => Arc::new(MemoryBackend::new(clock)),
    };
    Ok(KeyValueStore::new(backend, config.store_timeout()))
}
