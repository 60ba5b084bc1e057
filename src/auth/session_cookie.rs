//! Signed session cookie: issuing, clearing and resolving it back to a session

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, error};

use super::models::{Session, SessionClaims, PKCE_COOKIE, SESSION_COOKIE};
use crate::common::{ApiError, AppState};

/// Encodes the session id into an HS256 token expiring with the session
pub fn issue_session_token(
    secret: &str,
    account_id: &str,
    session_id: &str,
    expires_at: DateTime<Utc>,
) -> Result<String, ApiError> {
    let claims = SessionClaims {
        sub: account_id.to_string(),
        sid: session_id.to_string(),
        exp: expires_at.timestamp().max(0) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error = %e, account_id = %account_id, "JWT encoding error issuing session cookie");
        ApiError::InternalServer("jwt error".to_string())
    })
}

pub fn decode_session_token(secret: &str, token: &str) -> Option<SessionClaims> {
    match decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!(error = %e, "Session cookie rejected");
            None
        }
    }
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

pub fn pkce_cookie(verifier: String, secure: bool) -> Cookie<'static> {
    Cookie::build((PKCE_COOKIE, verifier))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Removal cookie; path must match the one used when setting
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Resolves the cookie to a live session, `None` when absent, invalid or expired
pub async fn resolve_session(state: &AppState, jar: &CookieJar) -> Option<(String, Session)> {
    let token = jar.get(SESSION_COOKIE)?.value().to_string();
    let claims = decode_session_token(&state.config.jwt_secret, &token)?;

    match state.sessions.get(&claims.sid).await {
        Ok(Some(session)) if session.account.id == claims.sub => Some((claims.sid, session)),
        Ok(_) => None,
        Err(e) => {
            error!(error = %e, "Session lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_issue_and_decode_round_trip() {
        let expires_at = Utc::now() + Duration::hours(1);
        let token = issue_session_token("secret", "acc-1", "sid-1", expires_at).unwrap();

        let claims = decode_session_token("secret", &token).expect("valid token");
        assert_eq!(claims.sub, "acc-1");
        assert_eq!(claims.sid, "sid-1");
        assert_eq!(claims.exp, expires_at.timestamp() as usize);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token =
            issue_session_token("secret", "acc-1", "sid-1", Utc::now() + Duration::hours(1))
                .unwrap();
        assert!(decode_session_token("other", &token).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token =
            issue_session_token("secret", "acc-1", "sid-1", Utc::now() - Duration::hours(1))
                .unwrap();
        assert!(decode_session_token("secret", &token).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok".to_string(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
