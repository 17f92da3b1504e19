//! lear-explorer - public-domain book explorer
//!
//! Serves cached Project Gutenberg books, fetching and caching them on first
//! request, and streams a language-model analysis of each book to the browser.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lear_common::config::{database_path, load_toml_config, resolve_root_folder};
use lear_explorer::config::resolve_chat_api_token;
use lear_explorer::db::{init_database_pool, SqliteBookRepository};
use lear_explorer::services::{
    AcquisitionSettings, AnalysisRelay, BookAcquisition, GutenbergClient, GutenbergScraper,
    SambaNovaClient,
};
use lear_explorer::AppState;

/// Command-line arguments for lear-explorer
#[derive(Parser, Debug)]
#[command(name = "lear-explorer")]
#[command(about = "Public-domain book explorer with streaming analysis")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "LEAR_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides TOML and root folder default)
    #[arg(short, long, env = "LEAR_DATABASE")]
    database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "LEAR_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config =
        load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the TOML level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting lear-explorer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder =
        resolve_root_folder(args.root_folder.as_deref(), "LEAR_ROOT_FOLDER", &toml_config);
    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| database_path(&root_folder, &toml_config));
    info!("Database: {}", db_path.display());

    let db_pool = init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let api_token = resolve_chat_api_token(&toml_config).map_err(|e| {
        error!("{}", e);
        anyhow::anyhow!("Missing chat API token")
    })?;

    let content = GutenbergClient::new(toml_config.gutenberg.base_url.clone())
        .context("Failed to build Gutenberg client")?;
    let scraper = GutenbergScraper::new().context("Failed to build metadata scraper")?;
    let engine = SambaNovaClient::new(
        toml_config.chat.api_url.clone(),
        api_token,
        toml_config.chat.model.clone(),
    )
    .context("Failed to build chat client")?;

    let fetch_timeout =
        (toml_config.fetch_timeout_secs > 0).then(|| Duration::from_secs(toml_config.fetch_timeout_secs));
    let acquisition = BookAcquisition::new(
        Arc::new(SqliteBookRepository::new(db_pool)),
        Arc::new(content),
        Arc::new(scraper),
    )
    .with_settings(AcquisitionSettings { fetch_timeout });
    let relay = AnalysisRelay::new(Arc::new(engine));

    let app = lear_explorer::build_router(AppState::new(acquisition, relay));

    let port = args.port.unwrap_or(toml_config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
