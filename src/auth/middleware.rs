//! Route protection for dashboard pages and guest-only auth pages

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::flow::{HOME_PATH, SIGN_IN_PATH};
use super::session_cookie::resolve_session;
use crate::common::AppState;

/// Auth paths that must stay reachable with a live session
const GUEST_PATH_EXCEPTIONS: [&str; 2] = ["/auth/callback", "/auth/notion"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    RequiresSession,
    GuestOnly,
    Open,
}

fn classify(path: &str) -> Guard {
    if path_has_prefix(path, HOME_PATH) {
        Guard::RequiresSession
    } else if path_has_prefix(path, SIGN_IN_PATH)
        && !GUEST_PATH_EXCEPTIONS.iter().any(|p| path_has_prefix(path, p))
    {
        Guard::GuestOnly
    } else {
        Guard::Open
    }
}

/// `/home` matches `/home` and `/home/..` but not `/homepage`
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Where to send the request instead, if anywhere
fn redirect_target(path: &str, signed_in: bool) -> Option<&'static str> {
    match (classify(path), signed_in) {
        (Guard::RequiresSession, false) => Some(SIGN_IN_PATH),
        (Guard::GuestOnly, true) => Some(HOME_PATH),
        _ => None,
    }
}

pub async fn route_guard(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if classify(&path) == Guard::Open {
        return next.run(request).await;
    }

    let state = state_lock.read().await.clone();
    let signed_in = resolve_session(&state, &jar).await.is_some();

    match redirect_target(&path, signed_in) {
        Some(target) => {
            debug!(path = %path, target = %target, signed_in, "Route guard redirect");
            Redirect::to(target).into_response()
        }
        None => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_home_goes_to_sign_in() {
        assert_eq!(redirect_target("/home", false), Some("/auth"));
        assert_eq!(redirect_target("/home/settings", false), Some("/auth"));
        assert_eq!(redirect_target("/home", true), None);
    }

    #[test]
    fn test_signed_in_auth_pages_go_home() {
        assert_eq!(redirect_target("/auth", true), Some("/home"));
        assert_eq!(redirect_target("/auth/login", true), Some("/home"));
        assert_eq!(redirect_target("/auth", false), None);
    }

    #[test]
    fn test_callback_never_intercepted() {
        assert_eq!(redirect_target("/auth/callback", true), None);
        assert_eq!(redirect_target("/auth/callback", false), None);
        assert_eq!(redirect_target("/auth/notion", true), None);
    }

    #[test]
    fn test_unrelated_paths_open() {
        assert_eq!(classify("/"), Guard::Open);
        assert_eq!(classify("/homepage"), Guard::Open);
        assert_eq!(classify("/authors"), Guard::Open);
        assert_eq!(classify("/api/me"), Guard::Open);
        assert_eq!(classify("/error"), Guard::Open);
    }
}
