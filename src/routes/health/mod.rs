use axum::{Json, extract::State};

use crate::{AppState, result::ApiResponse};

pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("Service healthy", &state.config.server_id))
}
