use serde::{Deserialize, Serialize};

/// 统一的 API 响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
    pub server_id: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, message: &str, server_id: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.to_string(),
            server_id: server_id.to_string(),
        }
    }
}

impl ApiResponse<()> {
    /// 不携带数据的成功响应
    pub fn message(message: &str, server_id: &str) -> Self {
        Self {
            success: true,
            data: None,
            message: message.to_string(),
            server_id: server_id.to_string(),
        }
    }
}
