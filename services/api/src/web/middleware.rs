//! services/api/src/web/middleware.rs
//!
//! Authentication, authorization, and rate-limiting middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::auth::AuthUser;
use crate::web::state::AppState;
use agent_metrics_core::ports::PortError;

/// Pulls the session token from `Authorization: Bearer` or the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("session="))
        .map(str::to_string)
        .filter(|t| !t.is_empty())
}

/// Middleware that validates the session token and resolves the caller.
///
/// If valid, inserts the `AuthUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the token from the headers
    let token = session_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Validate the auth session, get the agent id
    let agent_id = state
        .db
        .validate_auth_session(&token)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => StatusCode::UNAUTHORIZED,
            other => {
                error!("Failed to validate auth session: {:?}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    // 3. Load the account behind the session
    let agent = state.db.get_agent_by_id(agent_id).await.map_err(|e| match e {
        PortError::NotFound(_) => StatusCode::UNAUTHORIZED,
        other => {
            error!("Failed to load session owner: {:?}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    // 4. Insert the caller into request extensions
    req.extensions_mut().insert(AuthUser::from(agent));

    // 5. Continue to the handler
    Ok(next.run(req).await)
}

/// Middleware that admits administrators only. Must run inside `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, (StatusCode, String)> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()))?;
    if !user.is_admin() {
        return Err((
            StatusCode::FORBIDDEN,
            "Administrator access required".to_string(),
        ));
    }
    Ok(next.run(req).await)
}

/// The identity a request is rate limited under: the peer address, or the first
/// `X-Forwarded-For` hop when the deployment trusts its proxy.
fn client_key(req: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "shared".to_string())
}

/// Middleware that enforces the per-client request budget.
pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let key = client_key(&req, state.config.trust_proxy);
    if state.rate_limiter.allow(&key).await {
        return next.run(req).await;
    }

    let retry_after = state.rate_limiter.retry_after_secs(&key).await;
    warn!("Rate limit exceeded for {} ({} {})", key, req.method(), req.uri().path());
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        "Too many requests, please try again later".to_string(),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_empty_tokens_are_ignored() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn requests_without_a_peer_share_a_key() {
        let bare = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&bare, false), "shared");
        assert_eq!(client_key(&bare, true), "203.0.113.7");
    }

    fn request_from(peer: [u8; 4], forwarded: &str) -> Request {
        let mut req = axum::http::Request::builder()
            .uri("/health")
            .header("x-forwarded-for", forwarded)
            .body(axum::body::Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        req
    }

    #[test]
    fn forwarded_header_is_ignored_unless_trusted() {
        let req = request_from([203, 0, 113, 9], "10.0.0.1, 172.16.0.1");
        assert_eq!(client_key(&req, false), "203.0.113.9");
        assert_eq!(client_key(&req, true), "10.0.0.1");
    }
}
