use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::{
    AppState,
    middleware::{RequestGate, log_errors, rate_limit},
    routes,
};

// 用户相关的路由
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(routes::user::list_users).post(routes::user::create_user),
        )
        .route(
            "/users/{user_id}",
            get(routes::user::get_user).delete(routes::user::delete_user),
        )
}

/// 为路由加上错误日志和限流闸门
///
/// 限流闸门在最外层，处理函数 panic 转换成 500 后仍会带上配额头。
pub fn with_gate(router: Router<AppState>, gate: Arc<RequestGate>) -> Router<AppState> {
    router
        .layer(CatchPanicLayer::new())
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(gate, rate_limit))
}

// 创建主路由
pub fn create_router(state: AppState, gate: Arc<RequestGate>) -> Router {
    let routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(user_routes());
    with_gate(routes, gate).with_state(state)
}
