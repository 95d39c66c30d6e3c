//! gamedepot -- self-hostable game catalog server.
//!
//! Serves an anonymous read/search surface over a catalog of downloadable
//! game packages, plus an authenticated maintenance surface for catalog
//! entries and maintainer accounts.

mod accounts;
mod auth;
mod catalog;
mod cleanup;
mod config;
mod error;
mod handlers;
mod server;
mod storage;

use accounts::NewAccount;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gamedepot", about = "Self-hostable game catalog server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "depot.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::DepotConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        config::DepotConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.database_path = database;
    }

    let storage = storage::Storage::open(&cfg.database_path)?;
    let state = server::AppState::new(storage.clone(), &cfg);

    bootstrap_accounts(&state, &cfg)?;
    seed_catalog(&state, &cfg)?;

    cleanup::spawn_cleanup_task(storage);

    tracing::info!("Starting {} on {}", cfg.store_name, cfg.listen_addr);
    let app = server::build_router(state, &cfg);
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Provision the configured maintainer on an empty credential store. The
/// account is marked non-removable so a fresh install cannot lock itself
/// out of the maintenance surface.
fn bootstrap_accounts(state: &server::AppState, cfg: &config::DepotConfig) -> anyhow::Result<()> {
    if state.accounts.count()? > 0 {
        return Ok(());
    }
    match &cfg.bootstrap {
        Some(boot) => {
            state.accounts.provision(NewAccount {
                username: boot.username.clone(),
                password: boot.password.clone(),
                confirm: boot.password.clone(),
                algorithm: boot.hash_algorithm,
                rehash_count: boot.rehash_count,
                removable: false,
            })?;
            tracing::info!(username = %boot.username, "bootstrap maintainer provisioned");
        }
        None => {
            tracing::warn!(
                "credential store is empty and no [bootstrap] account is configured; \
                 maintenance endpoints will be unreachable"
            );
        }
    }
    Ok(())
}

/// Load seed entries through the validated add path when the catalog is
/// empty. A bad seed entry is skipped, not fatal.
fn seed_catalog(state: &server::AppState, cfg: &config::DepotConfig) -> anyhow::Result<()> {
    let Some(seed_path) = &cfg.seed_path else {
        return Ok(());
    };
    if !state.catalog.list()?.is_empty() {
        return Ok(());
    }
    let content = std::fs::read_to_string(seed_path)?;
    let seeds: Vec<catalog::NewGame> = serde_json::from_str(&content)?;
    for seed in seeds {
        match state.catalog.add(seed) {
            Ok(game) => tracing::debug!(name = %game.name, "seeded catalog entry"),
            Err(e) => tracing::warn!("skipping seed entry: {}", e),
        }
    }
    Ok(())
}
