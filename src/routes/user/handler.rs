use axum::extract::{Json, Path, State};

use crate::{
    AppState,
    database::UserEntity,
    error::AppError,
    result::ApiResponse,
    utils::success_to_api_response,
};

use super::model::{self, CreateUserRequest, UserListResponse, UserView};

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Json<ApiResponse<UserView>>, AppError> {
    let sourced = model::find_user(&state, user_id)
        .await
        .ok_or(AppError::UserNotFound)?;

    let message = if sourced.is_cached() {
        "User retrieved from cache"
    } else {
        "User retrieved from database"
    };
    Ok(success_to_api_response(
        UserView::from(sourced),
        message,
        &state.config.server_id,
    ))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserEntity>>, AppError> {
    let user = model::create_user(&state, req).await?;
    Ok(success_to_api_response(
        user,
        "User created successfully",
        &state.config.server_id,
    ))
}

pub async fn list_users(State(state): State<AppState>) -> Json<ApiResponse<UserListResponse>> {
    let users = model::list_users(&state).await;
    success_to_api_response(users, "Users retrieved", &state.config.server_id)
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    model::delete_user(&state, user_id).await?;
    Ok(Json(ApiResponse::message(
        "User deleted successfully",
        &state.config.server_id,
    )))
}
