use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    cache::{RateLimitInfo, TokenBucketLimiter, keys::client_ip_subject},
    config::{Config, FailurePolicy},
};

pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const X_SERVER_ID: HeaderName = HeaderName::from_static("x-server-id");

#[derive(Serialize)]
struct RateLimitExceeded {
    error: &'static str,
    reset_time: i64,
}

/// 请求限流闸门
///
/// 每个请求在路由之前按客户端地址扣减令牌。拒绝时直接返回 429，
/// 放行时在下游响应上附加配额和服务器标识头，不论下游是否出错。
#[derive(Clone)]
pub struct RequestGate {
    limiter: TokenBucketLimiter,
    limit: u32,
    window: Duration,
    failure_policy: FailurePolicy,
    trust_proxy_headers: bool,
    server_id: HeaderValue,
}

impl RequestGate {
    pub fn new(limiter: TokenBucketLimiter, config: &Config) -> Self {
        let server_id = HeaderValue::from_str(&config.server_id).unwrap_or_else(|_| {
            tracing::warn!("SERVER_ID is not a valid header value, using `unknown`");
            HeaderValue::from_static("unknown")
        });
        Self {
            limiter,
            limit: config.rate_limit_requests,
            window: config.rate_limit_window(),
            failure_policy: config.rate_limit_failure_policy,
            trust_proxy_headers: config.trust_proxy_headers,
            server_id,
        }
    }

    /// 从请求头或连接信息获取客户端 IP
    fn client_ip(&self, req: &Request<Body>) -> String {
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        let forwarded = if self.trust_proxy_headers {
            forwarded_ip(req.headers())
        } else {
            None
        };

        forwarded
            .or(remote_ip.as_deref())
            .unwrap_or("unknown")
            .trim()
            .to_string()
    }

    async fn decide(&self, subject: &str) -> RateLimitInfo {
        match self.failure_policy {
            FailurePolicy::Open => {
                self.limiter
                    .is_allowed(subject, self.limit, self.window)
                    .await
                    .1
            }
            FailurePolicy::Closed => {
                match self.limiter.try_acquire(subject, self.limit, self.window).await {
                    Ok(info) => info,
                    Err(e) => {
                        tracing::warn!(
                            "rate limiter store failure for {}, denying: {}",
                            subject,
                            e
                        );
                        RateLimitInfo {
                            allowed: false,
                            limit: i64::from(self.limit),
                            tokens_remaining: 0,
                            reset_time: self.limiter.now() + self.window.as_secs() as i64,
                        }
                    }
                }
            }
        }
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let subject = client_ip_subject(&self.client_ip(&req));
        let info = self.decide(&subject).await;

        if !info.allowed {
            return rejection(&info);
        }

        // 放行后配额已经扣减，下游失败也不回滚
        let mut response = next.run(req).await;
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.tokens_remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(info.reset_time));
        headers.insert(X_SERVER_ID, self.server_id.clone());
        response
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|ip| !ip.trim().is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
}

fn rejection(info: &RateLimitInfo) -> Response {
    let body = Json(RateLimitExceeded {
        error: "Rate limit exceeded",
        reset_time: info.reset_time,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(info.reset_time));
    response
}

pub async fn rate_limit(
    State(gate): State<Arc<RequestGate>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    gate.check_rate_limit(req, next).await
}
