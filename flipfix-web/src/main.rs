//! flipfix-web - HTTP server for the Flipfix maintenance tracker's link system
//!
//! Serves the link type picker, autocomplete search, and the save / edit /
//! render paths of linkable text fields.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flipfix_common::api::create_maintainer;
use flipfix_common::config::{database_path, load_config, resolve_root_folder};
use flipfix_common::db::init_database;
use flipfix_common::links::default_registry;
use flipfix_web::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for flipfix-web
#[derive(Parser, Debug)]
#[command(name = "flipfix-web")]
#[command(about = "Cross-reference link service for Flipfix")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder containing flipfix.db
    #[arg(short, long, env = "FLIPFIX_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5780
    #[arg(short, long, env = "FLIPFIX_BIND")]
    bind: Option<String>,

    /// Create a maintainer, print its token and exit
    #[arg(long, value_name = "USERNAME")]
    create_maintainer: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log level
    let config = load_config(args.config.as_deref()).context("Failed to load config")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Flipfix link service (flipfix-web) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to open database")?;

    if let Some(username) = args.create_maintainer {
        let (maintainer, token) = create_maintainer(&pool, &username).await?;
        info!("Created maintainer '{}' (id {})", maintainer.username, maintainer.id);
        println!("{}", token);
        return Ok(());
    }

    let registry = default_registry(&config.features)?;
    info!("Registered {} link type(s)", registry.len());

    if config.auth_disabled {
        warn!("Maintainer authentication is DISABLED");
    }

    let bind_address = args.bind.unwrap_or(config.bind_address);
    let state = AppState::new(pool, registry, config.auth_disabled);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("flipfix-web listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

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
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
