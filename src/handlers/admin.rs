//! Login plus the authenticated catalog-maintenance endpoints.

use crate::auth::{self, AuthedUser, Session};
use crate::catalog::{AdminGame, NewGame, SearchQuery};
use crate::error::DepotError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::{Extensions, HeaderMap};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Session>, DepotError> {
    let account = state.accounts.verify(&req.username, &req.password)?;
    let session = auth::issue_session(&state.storage, &account.username, state.session_ttl_secs)?;
    tracing::info!(username = %account.username, "maintainer logged in");
    Ok(Json(session))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, DepotError> {
    if let Some(token) = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        auth::revoke_session(&state.storage, token)?;
    }
    Ok(Json(serde_json::json!({"status": "logged_out"})))
}

pub async fn session(extensions: Extensions) -> Result<Json<serde_json::Value>, DepotError> {
    let username = authed(&extensions)?;
    Ok(Json(serde_json::json!({"username": username})))
}

pub async fn add_game(
    State(state): State<AppState>,
    Json(req): Json<NewGame>,
) -> Result<Json<AdminGame>, DepotError> {
    let game = state.catalog.add(req)?;
    tracing::info!(name = %game.name, "catalog entry added");
    Ok(Json(game))
}

#[derive(Deserialize)]
pub struct RemoveGamesRequest {
    pub sources: Vec<String>,
}

#[derive(Serialize)]
pub struct RemoveGamesResponse {
    pub removed: Vec<String>,
}

/// Removal keyed by the encoded source values the internal search hands
/// out. Name-keyed removal lives on `DELETE /api/v1/games/{name}`.
pub async fn remove_games(
    State(state): State<AppState>,
    Json(req): Json<RemoveGamesRequest>,
) -> Result<Json<RemoveGamesResponse>, DepotError> {
    let removed = state.catalog.remove_by_sources(&req.sources)?;
    tracing::info!(count = removed.len(), "catalog entries removed");
    Ok(Json(RemoveGamesResponse { removed }))
}

pub async fn delete_game(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, DepotError> {
    state.catalog.remove_by_name(&name)?;
    Ok(Json(serde_json::json!({"status": "deleted"})))
}

pub async fn search_internal(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<Vec<AdminGame>>, DepotError> {
    let games = match SearchQuery::parse(&term) {
        Some(query) => state.catalog.search_internal(&query)?,
        None => Vec::new(),
    };
    Ok(Json(games))
}

fn authed(extensions: &Extensions) -> Result<String, DepotError> {
    extensions
        .get::<AuthedUser>()
        .map(|user| user.0.clone())
        .ok_or_else(|| DepotError::Unauthorized("no session".into()))
}
