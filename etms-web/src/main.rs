//! etms-web - Endemic Tree Monitoring Service HTTP server
//!
//! Serves the public, app and head portal APIs over one SQLite database.

use anyhow::{Context, Result};
use clap::Parser;
use etms_common::config::{CliOverrides, ServiceConfig};
use etms_common::db::{init_database, users};
use etms_web::{build_router, AppState};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;

/// Command-line arguments for etms-web
#[derive(Parser, Debug)]
#[command(name = "etms-web")]
#[command(about = "Endemic Tree Monitoring Service")]
#[command(version)]
struct Args {
    /// Root folder holding the database (overrides ETMS_ROOT_FOLDER and config file)
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServiceConfig::resolve(&CliOverrides {
        root_folder: args.root_folder,
        bind: args.bind,
        port: args.port,
    });

    let level: Directive = config
        .log_level
        .parse()
        .unwrap_or_else(|_| tracing::Level::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level))
        .init();

    // Log identification before any database work
    info!("Starting ETMS web service (etms-web) v{}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", config.root_folder.display());

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e).context("database initialization failed");
        }
    };

    match users::purge_expired_sessions(&pool).await {
        Ok(0) => {}
        Ok(n) => info!("Purged {} expired sessions", n),
        Err(e) => warn!("Could not purge expired sessions: {}", e),
    }

    let state = AppState::new(pool, config.session_ttl_hours);
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("etms-web listening on http://{}", addr);
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
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
