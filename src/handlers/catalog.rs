//! Anonymous catalog endpoints.

use crate::catalog::{DownloadGrant, PublicGame, SearchQuery, TagFacets};
use crate::error::DepotError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::Json;

pub async fn front_page(State(state): State<AppState>) -> String {
    format!(
        "This is the {} API. This page is here to greet end users.\n\
         We strongly advise that you use the official client to interact with this API.\n",
        state.store_name
    )
}

pub async fn list_games(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicGame>>, DepotError> {
    Ok(Json(state.catalog.list()?))
}

pub async fn view_game(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PublicGame>, DepotError> {
    Ok(Json(state.catalog.get(&name)?))
}

pub async fn download_game(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DownloadGrant>, DepotError> {
    Ok(Json(state.catalog.record_download(&name)?))
}

/// Unrecognized search prefixes return an empty set, not an error.
pub async fn search(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<Vec<PublicGame>>, DepotError> {
    let games = match SearchQuery::parse(&term) {
        Some(query) => state.catalog.search_public(&query)?,
        None => Vec::new(),
    };
    Ok(Json(games))
}

pub async fn tags(State(state): State<AppState>) -> Result<Json<TagFacets>, DepotError> {
    Ok(Json(state.catalog.tag_facets()?))
}
