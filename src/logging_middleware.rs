// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode

use axum::body::to_bytes;
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, Level};

/// Routes whose bodies carry credentials and are never logged
const SENSITIVE_PREFIXES: [&str; 2] = ["/auth/", "/api/api-key"];

/// Bodies above this size are passed through without logging
const MAX_LOGGED_BODY: usize = 64 * 1024;

fn is_sensitive(path: &str) -> bool {
    SENSITIVE_PREFIXES.iter().any(|p| path.starts_with(p)) || path == "/auth"
}

fn render_body(bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() || bytes.len() > MAX_LOGGED_BODY {
        return None;
    }
    let body_str = std::str::from_utf8(bytes).ok()?;
    // Try to parse as JSON for pretty printing
    Some(
        serde_json::from_str::<serde_json::Value>(body_str)
            .ok()
            .and_then(|json| serde_json::to_string_pretty(&json).ok())
            .unwrap_or_else(|| body_str.to_string()),
    )
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !tracing::enabled!(Level::DEBUG) || is_sensitive(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(request_body) = render_body(&bytes) {
        debug!(
            method = %parts.method,
            uri = %parts.uri,
            request_body = %request_body,
            "📥 Request"
        );
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(response_body) = render_body(&bytes) {
        debug!(
            status = %parts.status,
            response_body = %response_body,
            "📤 Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
