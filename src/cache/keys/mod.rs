/// 缓存键模块
/// 提供各种缓存键生成函数

// 实体缓存键
pub mod user_keys;

// 限流桶键
pub mod rate_limit_keys;

pub use rate_limit_keys::{client_ip_subject, rate_limit_key};
pub use user_keys::user_key;
