//! Per-IP rate limiting middleware
//!
//! Applied to the conversion routes only: health, root, and downloads stay
//! unthrottled. Keys on the validated client IP and adds X-RateLimit-*
//! headers to every throttled route's response.

use crate::client_ip::extract_client_ip;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use flipfile_core::{AppError, ConversionKind};
use std::net::SocketAddr;
use std::sync::Arc;

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    // A route whose back-end is missing refuses before any rate budget is
    // spent on it.
    if let Some(kind) = request
        .uri()
        .path()
        .strip_prefix("/convert/")
        .and_then(ConversionKind::from_route_segment)
    {
        if !state.capabilities.is_available(kind) {
            return HttpAppError(AppError::ServiceUnavailable(format!(
                "The {} route requires a back-end that is not installed",
                kind
            )))
            .into_response();
        }
    }

    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let ip = extract_client_ip(
        request.headers(),
        socket_addr.as_ref(),
        state.config.trusted_proxy_count(),
    );
    let key = format!("ip:{}", ip);
    let limit = state.config.rate_limit();

    match state.limiter.admit(&key).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            set_header(&mut response, "X-RateLimit-Limit", &limit.to_string());
            set_header(
                &mut response,
                "X-RateLimit-Remaining",
                &remaining.to_string(),
            );
            response
        }
        Err(retry_after) => {
            tracing::warn!(ip = %ip, limit, "Rate limit exceeded");

            let retry_after_secs = retry_after.as_secs().max(1);
            let mut response =
                HttpAppError(AppError::RateLimited { retry_after_secs }).into_response();
            set_header(&mut response, "X-RateLimit-Limit", &limit.to_string());
            set_header(&mut response, "X-RateLimit-Remaining", "0");
            response
        }
    }
}

fn set_header(response: &mut Response, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}
