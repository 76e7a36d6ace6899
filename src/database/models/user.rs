use serde::{Deserialize, Serialize};

/// 用户实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub created_at: f64, // Unix timestamp，含小数秒
}
