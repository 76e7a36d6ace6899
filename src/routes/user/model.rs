use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    cache::{Sourced, keys::user_key},
    database::UserEntity,
    error::AppError,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(AppError::Validation("email must contain `@`".into()));
        }
        Ok(())
    }
}

/// 单个用户的响应，标记是否来自缓存
#[derive(Debug, Serialize, Deserialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: UserEntity,
    pub from_cache: bool,
}

impl From<Sourced<UserEntity>> for UserView {
    fn from(sourced: Sourced<UserEntity>) -> Self {
        let from_cache = sourced.is_cached();
        Self {
            user: sourced.value,
            from_cache,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserEntity>,
    pub count: usize,
}

/// 读穿透查询用户
pub async fn find_user(state: &AppState, user_id: u64) -> Option<Sourced<UserEntity>> {
    state
        .user_cache
        .read_through(&user_key(user_id), move || state.users.find_by_id(user_id))
        .await
}

/// 先写权威数据，再写缓存
pub async fn create_user(state: &AppState, req: CreateUserRequest) -> Result<UserEntity, AppError> {
    req.validate()?;
    let user = state.users.create(req.name.trim(), req.email.trim()).await;
    state.user_cache.write_through(&user_key(user.id), &user).await;
    Ok(user)
}

/// 先删权威数据，成功后再删缓存
pub async fn delete_user(state: &AppState, user_id: u64) -> Result<UserEntity, AppError> {
    let removed = state
        .users
        .remove(user_id)
        .await
        .ok_or(AppError::UserNotFound)?;
    state.user_cache.invalidate(&user_key(user_id)).await;
    Ok(removed)
}

pub async fn list_users(state: &AppState) -> UserListResponse {
    let users = state.users.list().await;
    UserListResponse {
        count: users.len(),
        users,
    }
}
