use serde::{Deserialize, Serialize};

/// 读取结果的来源
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    Cache,
    Store,
}

/// 带来源标记的读取结果
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: CacheSource,
}

impl<T> Sourced<T> {
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            source: CacheSource::Cache,
        }
    }

    pub fn from_store(value: T) -> Self {
        Self {
            value,
            source: CacheSource::Store,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.source == CacheSource::Cache
    }
}
