//! condo-server - REST API and browser UI for the condo ledger
//!
//! Startup: resolve configuration (CLI > env > TOML > defaults), open or
//! create the database, bootstrap the first admin account if configured,
//! then serve until Ctrl+C / SIGTERM.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use condo_common::config::{ConfigOverrides, Settings};
use condo_common::db::{init_database, users};
use condo_server::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for condo-server
#[derive(Parser, Debug)]
#[command(name = "condo-server")]
#[command(about = "Condominium ledger REST API and web UI")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CONDO_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the database and other data
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Database file (relative paths resolve against the root folder)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable login; every request is treated as an admin
    #[arg(long)]
    no_auth: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            root_folder: self.root_folder.clone(),
            database: self.database.clone(),
            bind_address: self.bind,
            port: self.port,
            disable_auth: self.no_auth,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Subscriber first so configuration warnings are not lost; RUST_LOG wins,
    // otherwise `info` until the configured level is known
    let env_filter = EnvFilter::try_from_default_env().ok();
    let rust_log_set = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new("info,tower_http=info")),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database work
    info!(
        "Starting condo-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let settings = Settings::resolve(&args.overrides());
    if let (false, Ok(settings)) = (rust_log_set, &settings) {
        let level = format!("{},tower_http=info", settings.log_level);
        if let Err(e) = filter_handle.reload(EnvFilter::new(level)) {
            warn!("Failed to apply log level '{}': {}", settings.log_level, e);
        }
    }

    let settings = settings.context("Failed to resolve configuration")?;
    settings
        .ensure_root_folder()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", settings.root_folder.display());
    info!("Database path: {}", settings.database_path.display());

    let pool = init_database(&settings.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    if settings.auth.enabled {
        users::ensure_bootstrap_admin(&pool, settings.auth.bootstrap_admin.as_ref())
            .await
            .context("Failed to create bootstrap admin")?;
        if users::count_users(&pool).await? == 0 {
            warn!(
                "Authentication is enabled but no users exist; set CONDO_ADMIN_USERNAME and \
                 CONDO_ADMIN_PASSWORD (or [auth] admin_username/admin_password) to create one"
            );
        }
    } else {
        warn!("Authentication disabled; every request has admin access");
    }

    let state = AppState::new(pool, settings.auth.clone());
    let app = build_router(state, settings.cors_permissive);

    let addr = settings.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("condo-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
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
