//! Axum router setup.

use crate::accounts::Accounts;
use crate::auth::auth_middleware;
use crate::catalog::Catalog;
use crate::config::DepotConfig;
use crate::handlers::{accounts, admin, catalog};
use crate::storage::Storage;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub catalog: Catalog,
    pub accounts: Accounts,
    pub store_name: String,
    pub session_ttl_secs: i64,
}

impl AppState {
    pub fn new(storage: Storage, config: &DepotConfig) -> Self {
        Self {
            catalog: Catalog::new(storage.clone()),
            accounts: Accounts::new(storage.clone()),
            storage,
            store_name: config.store_name.clone(),
            session_ttl_secs: config.session_ttl_secs,
        }
    }
}

pub fn build_router(state: AppState, config: &DepotConfig) -> Router {
    // Maintenance routes sit behind the session middleware
    let authenticated = Router::new()
        .route("/api/v1/logout", post(admin::logout))
        .route("/api/v1/session", get(admin::session))
        .route("/api/v1/games", post(admin::add_game))
        .route("/api/v1/games/remove", post(admin::remove_games))
        .route("/api/v1/games/{name}", delete(admin::delete_game))
        .route("/api/v1/search/{term}", get(admin::search_internal))
        .route(
            "/api/v1/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route("/api/v1/accounts/algorithms", get(accounts::list_algorithms))
        .route(
            "/api/v1/accounts/{username}",
            put(accounts::rotate_account).delete(accounts::remove_account),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Anonymous catalog surface
    let public = Router::new()
        .route("/", get(catalog::front_page))
        .route("/games", get(catalog::list_games))
        .route("/games/{name}", get(catalog::view_game))
        .route("/games/{name}/download", get(catalog::download_game))
        .route("/search/{term}", get(catalog::search))
        .route("/tags", get(catalog::tags))
        .route("/api/v1/login", post(admin::login))
        .route("/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
