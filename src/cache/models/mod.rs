/// 缓存数据模型
/// 定义缓存数据的结构体

// 实体缓存读取结果
pub mod entry;

// 令牌桶
pub mod rate_limit;

pub use entry::{CacheSource, Sourced};
pub use rate_limit::{Admission, RateLimitInfo, TokenBucket};
