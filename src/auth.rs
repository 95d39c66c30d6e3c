//! Bearer-token session auth for the maintenance endpoints.

use crate::error::DepotError;
use crate::server::AppState;
use crate::storage::Storage;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use rand::RngCore;
use rusqlite::OptionalExtension;
use serde::Serialize;

/// Username of the authenticated maintainer, injected into request
/// extensions by the middleware.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub expires_at: i64,
}

/// Auth middleware: resolves the bearer token to a live session on every
/// request. Sessions live in the store, so a revoked or expired token is
/// rejected immediately and there is no in-process cache to go stale.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, DepotError> {
    let token = bearer_token(&request)?;
    let username = lookup_session(&state.storage, &token)?;
    request.extensions_mut().insert(AuthedUser(username));
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request<Body>) -> Result<String, DepotError> {
    request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
        .ok_or_else(|| DepotError::Unauthorized("missing bearer token".into()))
}

pub fn lookup_session(storage: &Storage, token: &str) -> Result<String, DepotError> {
    let conn = storage.conn()?;
    let now = Utc::now().timestamp();
    conn.query_row(
        "SELECT username FROM sessions WHERE token = ?1 AND expires_at > ?2",
        rusqlite::params![token, now],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DepotError::Unauthorized("invalid or expired session".into()))
}

/// Issue a fresh session for a verified login.
pub fn issue_session(
    storage: &Storage,
    username: &str,
    ttl_secs: i64,
) -> Result<Session, DepotError> {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let token = hex::encode(raw);

    let now = Utc::now().timestamp();
    let expires_at = now + ttl_secs;
    let conn = storage.conn()?;
    conn.execute(
        "INSERT INTO sessions (token, username, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![token, username, now, expires_at],
    )?;
    Ok(Session {
        token,
        username: username.to_owned(),
        expires_at,
    })
}

pub fn revoke_session(storage: &Storage, token: &str) -> Result<(), DepotError> {
    let conn = storage.conn()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
    Ok(())
}
