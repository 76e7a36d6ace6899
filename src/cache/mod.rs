// 缓存模块
// 包含共享存储、缓存数据结构和操作逻辑

pub mod keys;
pub mod models;
pub mod operations;
pub mod store;

// 重新导出常用类型和函数，方便其他模块使用
pub use models::{CacheSource, RateLimitInfo, Sourced, TokenBucket};
pub use operations::{EntityCache, TokenBucketLimiter};
pub use store::{KeyValueStore, MemoryBackend, RedisBackend, StoreBackend, StoreError};
