// 数据库模块
// 包含权威数据实体定义和存储库操作

pub mod models; // 实体定义
pub mod repositories; // 存储库实现

// 重新导出常用类型，方便其他模块使用
pub use models::user::UserEntity;
pub use repositories::user::UserRepository;
