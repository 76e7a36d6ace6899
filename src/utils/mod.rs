use axum::Json;
use serde::Serialize;

use crate::result::ApiResponse;

/// 时间源，返回 Unix 时间戳（秒）
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
pub(crate) use testing::ManualClock;


pub fn success_to_api_response<T: Serialize>(
    data: T,
    message: &str,
    server_id: &str,
) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data, message, server_id))
}
