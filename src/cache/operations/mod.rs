/// 缓存操作
/// 提供缓存操作的功能实现

// 实体读写缓存
pub mod entity;

// 令牌桶限流
pub mod rate_limit;

// 重新导出常用操作
pub use entity::EntityCache;
pub use rate_limit::TokenBucketLimiter;
