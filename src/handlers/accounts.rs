//! Authenticated account-management endpoints.

use crate::accounts::{AccountInfo, HashAlgorithm, NewAccount};
use crate::error::DepotError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountInfo>>, DepotError> {
    Ok(Json(state.accounts.list()?))
}

/// The digest registry the account forms may pick from.
pub async fn list_algorithms() -> Json<Vec<&'static str>> {
    Json(HashAlgorithm::ALL.iter().map(|algo| algo.name()).collect())
}

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: String,
    pub password_check: String,
    pub hash_algorithm: String,
    pub rehash_count: u32,
    #[serde(default)]
    pub removable: bool,
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<AccountInfo>, DepotError> {
    let algorithm = parse_algorithm(&req.hash_algorithm)?;
    let account = state.accounts.provision(NewAccount {
        username: req.username,
        password: req.password,
        confirm: req.password_check,
        algorithm,
        rehash_count: req.rehash_count,
        removable: req.removable,
    })?;
    tracing::info!(username = %account.username, "maintainer account provisioned");
    Ok(Json(AccountInfo::from(&account)))
}

#[derive(Deserialize)]
pub struct RotateAccountRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_check: String,
    pub hash_algorithm: String,
    pub rehash_count: u32,
}

pub async fn rotate_account(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<RotateAccountRequest>,
) -> Result<Json<AccountInfo>, DepotError> {
    let algorithm = parse_algorithm(&req.hash_algorithm)?;
    let account = state.accounts.rotate(
        &username,
        &req.password,
        &req.password_check,
        algorithm,
        req.rehash_count,
    )?;
    Ok(Json(AccountInfo::from(&account)))
}

pub async fn remove_account(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, DepotError> {
    state.accounts.remove(&username)?;
    tracing::info!(username = %username, "maintainer account removed");
    Ok(Json(serde_json::json!({"status": "removed"})))
}

fn parse_algorithm(name: &str) -> Result<HashAlgorithm, DepotError> {
    HashAlgorithm::from_name(name)
        .ok_or_else(|| DepotError::Validation(format!("unknown hash algorithm {:?}", name)))
}
