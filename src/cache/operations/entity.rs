use std::future::Future;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::cache::models::Sourced;
use crate::cache::store::KeyValueStore;

/// 实体缓存：读穿透、写穿透、删除失效
///
/// 存储故障只会降级为未命中，不会让请求失败。
#[derive(Clone)]
pub struct EntityCache {
    store: KeyValueStore,
    ttl: Duration,
}

impl EntityCache {
    pub fn new(store: KeyValueStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 先查缓存，未命中时调用 `fetch` 读取权威数据并回填
    pub async fn read_through<T, F, Fut>(&self, key: &str, fetch: F) -> Option<Sourced<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        match self.store.get_json::<T>(key).await {
            Ok(Some(value)) => return Some(Sourced::from_cache(value)),
            Ok(None) => {}
            Err(e) => tracing::warn!("cache read failed for {}, falling through: {}", key, e),
        }

        let value = fetch().await?;
        self.populate(key, &value).await;
        Some(Sourced::from_store(value))
    }

    /// 权威写入成功之后调用
    pub async fn write_through<T: Serialize>(&self, key: &str, value: &T) -> bool {
        self.populate(key, value).await
    }

    /// 权威删除成功之后调用
    pub async fn invalidate(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("cache invalidation failed for {}: {}", key, e);
                false
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match self.store.set_json(key, value, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("cache write failed for {}: {}", key, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;

    use super::*;
    use crate::cache::models::CacheSource;
    use crate::cache::store::MemoryBackend;
    use crate::cache::store::testing::UnreachableBackend;
    use crate::utils::ManualClock;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: u64,
        label: String,
    }

    fn widget() -> Widget {
        Widget {
            id: 7,
            label: "seven".into(),
        }
    }

    fn cache() -> (Arc<ManualClock>, EntityCache) {
        let clock = Arc::new(ManualClock::new(0));
        let store = KeyValueStore::new(
            Arc::new(MemoryBackend::new(clock.clone())),
            Duration::from_millis(100),
        );
        (clock, EntityCache::new(store, Duration::from_secs(300)))
    }

    #[tokio::test]
    async fn miss_fetches_then_hit_serves_from_cache() {
        let (_clock, cache) = cache();
        let counter = AtomicUsize::new(0);
        let fetches = &counter;

        let first = cache
            .read_through("widget:7", move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Some(widget())
            })
            .await
            .unwrap();
        assert_eq!(first.source, CacheSource::Store);

        let second = cache
            .read_through("widget:7", move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Some(widget())
            })
            .await
            .unwrap();
        assert!(second.is_cached());
        assert_eq!(second.value, widget());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn written_value_is_read_back_from_cache() {
        let (_clock, cache) = cache();
        assert!(cache.write_through("widget:7", &widget()).await);

        let read = cache
            .read_through("widget:7", || async { None::<Widget> })
            .await
            .unwrap();
        assert!(read.is_cached());
        assert_eq!(read.value, widget());
    }

    #[tokio::test]
    async fn invalidated_entry_falls_through_to_store() {
        let (_clock, cache) = cache();
        cache.write_through("widget:7", &widget()).await;
        assert!(cache.invalidate("widget:7").await);

        let read = cache
            .read_through("widget:7", || async { Some(widget()) })
            .await
            .unwrap();
        assert_eq!(read.source, CacheSource::Store);

        cache.invalidate("widget:7").await;
        let gone = cache
            .read_through("widget:7", || async { None::<Widget> })
            .await;
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let (clock, cache) = cache();
        cache.write_through("widget:7", &widget()).await;

        clock.advance(300);
        let read = cache
            .read_through("widget:7", || async { Some(widget()) })
            .await
            .unwrap();
        assert_eq!(read.source, CacheSource::Store);
    }

    #[tokio::test]
    async fn unreachable_store_falls_through() {
        let store =
            KeyValueStore::new(Arc::new(UnreachableBackend), Duration::from_millis(100));
        let cache = EntityCache::new(store, Duration::from_secs(300));

        let read = cache
            .read_through("widget:7", || async { Some(widget()) })
            .await
            .unwrap();
        assert_eq!(read.source, CacheSource::Store);
        assert!(!cache.write_through("widget:7", &widget()).await);
        assert!(!cache.invalidate("widget:7").await);
    }
}
