use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use gatekeeper::{
    AppState,
    cache::TokenBucketLimiter,
    config::Config,
    middleware::RequestGate,
    open_store,
    router::create_router,
    utils::{Clock, SystemClock},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 设置共享存储
    let store = open_store(&config, clock.clone()).expect("Failed to create store client");
    tracing::info!(
        "Store backend: {:?} at {} (timeout {:?})",
        config.store_backend,
        config.store_url(),
        config.store_timeout()
    );

    // 设置限流闸门
    let limiter = TokenBucketLimiter::new(store.clone(), clock);
    let gate = Arc::new(RequestGate::new(limiter, &config));
    tracing::info!(
        "Rate limit: {} requests per {} seconds, failure policy {:?}",
        config.rate_limit_requests,
        config.rate_limit_window_secs,
        config.rate_limit_failure_policy
    );

    let state = AppState::new(config.clone(), store);
    let router = create_router(state, gate);

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server {} listening on {}", config.server_id, addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
