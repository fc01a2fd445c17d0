//! Session lifecycle and the `session_id` cookie
//!
//! Tokens are 48 random bytes, base64url-encoded. Every check is a store
//! round-trip; nothing is cached in process.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::Rng;

use crate::error::StoreResult;
use crate::model::{Session, User};
use crate::store::{self, ContentStore};

pub const SESSION_COOKIE: &str = "session_id";
pub const SESSION_TTL_DAYS: i64 = 7;
const TOKEN_BYTES: usize = 48;

pub fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Persists a fresh session for `user_id`
pub async fn issue(store: &dyn ContentStore, user_id: i64) -> StoreResult<Session> {
    let session = Session {
        id: new_token(),
        user_id,
        expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
        revoked: false,
    };
    store.insert_session(&session).await?;
    tracing::info!(user_id, "session issued");
    Ok(session)
}

/// Resolves a token to its user
///
/// Any failure along the way (unknown token, revoked, expired, deleted user,
/// store error) yields `None`: the caller is simply anonymous.
pub async fn current_user(store: &dyn ContentStore, token: &str) -> Option<User> {
    let session = match store::active_session(store, token, Utc::now()).await {
        Ok(Some(session)) => session,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "session lookup failed");
            return None;
        }
    };

    match store.user_by_id(session.user_id).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, user_id = session.user_id, "session user lookup failed");
            None
        }
    }
}

/// Marks the session revoked; unknown or already revoked tokens are a no-op
pub async fn revoke(store: &dyn ContentStore, token: &str) -> StoreResult<()> {
    store.revoke_session(token).await
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

/// Local development hosts get cookies without the `Secure` flag
pub fn is_secure_host(host: &str) -> bool {
    let name = match host.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() => name,
        _ => host,
    };
    !matches!(name, "localhost" | "127.0.0.1" | "[::1]" | "0.0.0.0")
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let max_age = Duration::days(SESSION_TTL_DAYS).num_seconds();
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::EmbeddedStore;
    use crate::model::NewUser;
    use axum::http::HeaderValue;
    use tempfile::NamedTempFile;

    #[test]
    fn test_token_carries_48_bytes() {
        let token = new_token();
        assert_eq!(URL_SAFE_NO_PAD.decode(&token).unwrap().len(), TOKEN_BYTES);
        assert_ne!(token, new_token());
    }

    #[test]
    fn test_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc-123; lang=en"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc-123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn test_cookie_flags() {
        let cookie = session_cookie("tok", true);
        assert!(cookie.starts_with("session_id=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.ends_with("; Secure"));
        assert!(!session_cookie("tok", false).contains("Secure"));
        assert!(clear_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_secure_host_detection() {
        assert!(!is_secure_host("localhost:8080"));
        assert!(!is_secure_host("127.0.0.1"));
        assert!(is_secure_host("short.example.com"));
    }

    #[tokio::test]
    async fn test_revoked_session_no_longer_resolves() {
        let temp_db = NamedTempFile::new().unwrap();
        let store = EmbeddedStore::open(temp_db.path()).unwrap();
        let user = store
            .create_user(NewUser {
                email: "a@example.com".to_string(),
                password_hash: "hash".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let session = issue(&store, user.id).await.unwrap();
        assert_eq!(current_user(&store, &session.id).await, Some(user));

        revoke(&store, &session.id).await.unwrap();
        assert_eq!(current_user(&store, &session.id).await, None);
        assert_eq!(current_user(&store, "unknown").await, None);
    }

    #[tokio::test]
    async fn test_expired_session_no_longer_resolves() {
        let temp_db = NamedTempFile::new().unwrap();
        let store = EmbeddedStore::open(temp_db.path()).unwrap();
        store
            .insert_session(&Session {
                id: "old".to_string(),
                user_id: 1,
                expires_at: Utc::now() - Duration::seconds(1),
                revoked: false,
            })
            .await
            .unwrap();

        assert_eq!(current_user(&store, "old").await, None);
    }
}
