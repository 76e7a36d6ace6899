use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::database::models::user::UserEntity;

#[derive(Debug, Default)]
struct UserTable {
    rows: BTreeMap<u64, UserEntity>,
    last_id: u64,
}

/// 用户存储库，进程内的权威数据
///
/// 通过 `AppState` 注入，克隆后共享同一张表。
#[derive(Debug, Clone, Default)]
pub struct UserRepository {
    table: Arc<RwLock<UserTable>>,
}

impl UserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建用户，ID 单调递增
    pub async fn create(&self, name: &str, email: &str) -> UserEntity {
        let mut table = self.table.write().await;
        table.last_id += 1;

        let user = UserEntity {
            id: table.last_id,
            name: name.to_string(),
            email: email.to_string(),
            created_at: chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0,
        };
        table.rows.insert(user.id, user.clone());
        tracing::debug!("Created user {}", user.id);
        user
    }

    pub async fn find_by_id(&self, id: u64) -> Option<UserEntity> {
        self.table.read().await.rows.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<UserEntity> {
        self.table.read().await.rows.values().cloned().collect()
    }

    /// 删除用户，返回被删除的记录
    pub async fn remove(&self, id: u64) -> Option<UserEntity> {
        self.table.write().await.rows.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_never_reused() {
        let repo = UserRepository::new();
        let alice = repo.create("Alice", "alice@example.com").await;
        let bob = repo.create("Bob", "bob@example.com").await;
        assert_eq!((alice.id, bob.id), (1, 2));

        assert!(repo.remove(bob.id).await.is_some());
        let carol = repo.create("Carol", "carol@example.com").await;
        assert_eq!(carol.id, 3);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let repo = UserRepository::new();
        for name in ["a", "b", "c"] {
            repo.create(name, &format!("{}@example.com", name)).await;
        }
        repo.remove(2).await;
        let ids: Vec<u64> = repo.list().await.into_iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(repo.find_by_id(2).await, None);
    }
}
