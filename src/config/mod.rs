use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// 限流存储故障时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 存储不可用时放行
    Open,
    /// 存储不可用时拒绝
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailurePolicy::Open),
            "closed" => Ok(FailurePolicy::Closed),
            other => Err(format!("unknown failure policy `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendKind {
    Redis,
    Memory,
}

impl FromStr for StoreBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackendKind::Redis),
            "memory" => Ok(StoreBackendKind::Memory),
            other => Err(format!("unknown store backend `{}`", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackendKind,
    pub store_host: String,
    pub store_port: u16,
    pub store_db: i64,
    pub store_timeout_ms: u64,
    pub server_host: String,
    pub server_port: u16,
    pub server_id: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_failure_policy: FailurePolicy,
    pub cache_ttl_secs: u64,
    pub trust_proxy_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_backend: StoreBackendKind::Redis,
            store_host: "127.0.0.1".into(),
            store_port: 6379,
            store_db: 0,
            store_timeout_ms: 250,
            server_host: "0.0.0.0".into(),
            server_port: 8000,
            server_id: default_server_id(),
            rate_limit_requests: 10,
            rate_limit_window_secs: 60,
            rate_limit_failure_policy: FailurePolicy::Open,
            cache_ttl_secs: 300,
            // 只有部署在可信代理之后才应开启
            trust_proxy_headers: false,
        }
    }
}

fn default_server_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("server-{}", &id[..8])
}

/// 读取环境变量，未设置时返回默认值
fn var_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            store_backend: var_or("STORE_BACKEND", defaults.store_backend)?,
            store_host: var_or("STORE_HOST", defaults.store_host)?,
            store_port: var_or("STORE_PORT", defaults.store_port)?,
            store_db: var_or("STORE_DB", defaults.store_db)?,
            store_timeout_ms: var_or("STORE_TIMEOUT_MS", defaults.store_timeout_ms)?,
            server_host: var_or("SERVER_HOST", defaults.server_host)?,
            server_port: var_or("SERVER_PORT", defaults.server_port)?,
            server_id: var_or("SERVER_ID", defaults.server_id)?,
            rate_limit_requests: var_or("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            rate_limit_window_secs: var_or("RATE_LIMIT_WINDOW", defaults.rate_limit_window_secs)?,
            rate_limit_failure_policy: var_or(
                "RATE_LIMIT_FAILURE_POLICY",
                defaults.rate_limit_failure_policy,
            )?,
            cache_ttl_secs: var_or("CACHE_TTL", defaults.cache_ttl_secs)?,
            trust_proxy_headers: var_or("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // 令牌桶要求 limit >= 1
        if self.rate_limit_requests == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_REQUESTS",
                reason: "must be at least 1".into(),
            });
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_WINDOW",
                reason: "must be at least 1".into(),
            });
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "CACHE_TTL",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn store_url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.store_host, self.store_port, self.store_db
        )
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_policy() {
        let config = Config::default();
        assert_eq!(config.rate_limit_requests, 10);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.store_url(), "redis://127.0.0.1:6379/0");
        assert!(config.server_id.starts_with("server-"));
        assert_eq!(config.server_id.len(), "server-".len() + 8);
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let config = Config {
            rate_limit_requests: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn failure_policy_parses_case_insensitively() {
        assert_eq!("Closed".parse::<FailurePolicy>(), Ok(FailurePolicy::Closed));
        assert_eq!(" open ".parse::<FailurePolicy>(), Ok(FailurePolicy::Open));
        assert!("maybe".parse::<FailurePolicy>().is_err());
        assert_eq!("memory".parse::<StoreBackendKind>(), Ok(StoreBackendKind::Memory));
    }
}
