/// 限流桶键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 限流主体（按客户端地址）
pub fn client_ip_subject(ip: &str) -> String {
    format!("ip:{}", ip)
}

/// 生成限流桶在存储中的键
pub fn rate_limit_key(subject: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, subject)
}
