//! Rate limiting middleware.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};

use common::error::{HEADER_RATE_LIMIT, HEADER_RATE_LIMIT_REMAINING};

use super::RestState;
use crate::rate_limit::{client_identity, Decision};

/// Throttle by route template and client identity.
///
/// Allowed responses carry `X-RateLimit-Limit` and `X-RateLimit-Remaining`.
pub async fn rate_limit_middleware(
    State(state): State<RestState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    matched_path: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let route = matched_path
        .as_ref()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let identity = client_identity(
        request.headers(),
        connect_info.map(|ConnectInfo(addr)| addr),
    );

    match state.limiter.check(&route, &identity).await {
        Ok(Decision::Allowed { limit, remaining }) => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(HEADER_RATE_LIMIT, HeaderValue::from(limit));
            headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Ok(Decision::Bypassed | Decision::FailedOpen) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}
