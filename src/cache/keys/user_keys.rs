/// 用户实体缓存键前缀
const USER_PREFIX: &str = "user:";

/// 生成用户实体缓存键
pub fn user_key(user_id: u64) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_is_derived_from_identity() {
        assert_eq!(user_key(42), "user:42");
    }
}
