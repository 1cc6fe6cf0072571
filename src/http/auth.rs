use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::warn;

use crate::auth::constant_time_eq;
use crate::http::state::AppState;

/// Bearer-token auth middleware, grounded in the teacher's
/// `auth::middleware::auth_middleware` but checking one shared password
/// instead of a session-token table, matching
/// `original_source/yippy/yippy.go`'s `authMiddleware`.
pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let client_ip = addr.ip();

    if state.rate_limiter.is_rate_limited(client_ip) {
        warn!(ip = %client_ip, "rate limited request");
        return rate_limited_response();
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(auth_value) = auth_header else {
        state.rate_limiter.record_failure(client_ip);
        return unauthorized_response("missing Authorization header");
    };

    let token = match auth_value.split_once(' ') {
        Some(("Bearer", token)) => token,
        _ => {
            state.rate_limiter.record_failure(client_ip);
            return unauthorized_response("expected a Bearer token");
        }
    };

    if !constant_time_eq(token.as_bytes(), state.config.password.as_bytes()) {
        let is_limited = state.rate_limiter.record_failure(client_ip);
        if is_limited {
            warn!(ip = %client_ip, "ip rate limited after failed auth");
        }
        return unauthorized_response("invalid password");
    }

    state.rate_limiter.clear(client_ip);

    next.run(request).await
}

fn rate_limited_response() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "too many requests",
            "message": "too many failed authentication attempts, try again later"
        })),
    )
        .into_response()
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized", "message": message })),
    )
        .into_response()
}
