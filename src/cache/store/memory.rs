use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{StoreBackend, StoreError};
use crate::cache::models::{Admission, TokenBucket};
use crate::utils::Clock;

#[derive(Debug, Clone)]
enum MemoryValue {
    Text(String),
    Bucket(TokenBucket),
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: MemoryValue,
    expires_at: i64,
}

impl MemoryEntry {
    fn is_live(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// 两次过期清扫之间的最小间隔（秒）
const SWEEP_INTERVAL_SECS: i64 = 60;

fn ttl_secs(ttl: Duration) -> i64 {
    ttl.as_secs().max(1) as i64
}

/// 进程内存储后端
///
/// 单个键上的操作在 DashMap 分片锁内完成，`take_token` 因此在进程内是原子的。
/// 过期在访问时按注入的时钟惰性判断，写入时每隔 `SWEEP_INTERVAL_SECS`
/// 整体清扫一次，不再访问的键不会一直留在表里。
pub struct MemoryBackend {
    entries: DashMap<String, MemoryEntry>,
    clock: Arc<dyn Clock>,
    next_sweep: AtomicI64,
}

impl MemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let next_sweep = AtomicI64::new(clock.now() + SWEEP_INTERVAL_SECS);
        Self {
            entries: DashMap::new(),
            clock,
            next_sweep,
        }
    }

    /// 当前条目数，包括尚未清扫的过期条目
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 删除所有在 `now` 已过期的条目，返回删除的数量
    pub fn cleanup(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!("memory store swept {} expired entries", removed);
        }
        removed
    }

    /// 到期时由一个调用方执行清扫，其余调用方直接返回
    ///
    /// 调用时不能持有任何条目引用，`retain` 需要锁住全部分片。
    fn maybe_sweep(&self, now: i64) {
        let due = self.next_sweep.load(Ordering::Relaxed);
        if now < due {
            return;
        }
        if self
            .next_sweep
            .compare_exchange(
                due,
                now + SWEEP_INTERVAL_SECS,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            self.cleanup(now);
        }
    }

    /// 在单个键的分片锁内完成读取、补充和写回
    fn admit_locked(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        now: i64,
    ) -> Result<Admission, StoreError> {
        let expires_at = now + ttl_secs(window);

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let existing = if occupied.get().is_live(now) {
                    match occupied.get().value {
                        MemoryValue::Bucket(bucket) => Some(bucket),
                        MemoryValue::Text(_) => {
                            return Err(StoreError::WrongType(key.to_string()));
                        }
                    }
                } else {
                    None
                };

                let admission = TokenBucket::admit(existing, limit, now);
                match admission.updated {
                    Some(updated) => {
                        occupied.insert(MemoryEntry {
                            value: MemoryValue::Bucket(updated),
                            expires_at,
                        });
                    }
                    None if existing.is_none() => {
                        occupied.remove();
                    }
                    None => {}
                }
                Ok(admission)
            }
            Entry::Vacant(vacant) => {
                let admission = TokenBucket::admit(None, limit, now);
                if let Some(updated) = admission.updated {
                    vacant.insert(MemoryEntry {
                        value: MemoryValue::Bucket(updated),
                        expires_at,
                    });
                }
                Ok(admission)
            }
        }
    }

    /// 读取未过期的条目，顺带清除已过期的
    fn live_entry(&self, key: &str) -> Option<MemoryEntry> {
        let now = self.clock.now();
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.is_live(now) {
            Some(entry)
        } else {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
            None
        }
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.live_entry(key) {
            Some(MemoryEntry {
                value: MemoryValue::Text(text),
                ..
            }) => Ok(Some(text)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: MemoryValue::Text(value),
                expires_at: now + ttl_secs(ttl),
            },
        );
        self.maybe_sweep(now);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live_entry(key).is_some())
    }

    async fn take_token(
        &self,
        key: &str,
        limit: i64,
        window: Duration,
        now: i64,
    ) -> Result<Admission, StoreError> {
        let admission = self.admit_locked(key, limit, window, now);
        self.maybe_sweep(now);
        admission
    }
}
