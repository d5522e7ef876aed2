//! vanno-rv - researcher view server
//!
//! Serves rating charts, participant clusters, data export and study
//! configuration for vanno video-annotation studies.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vanno_common::config::{resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use vanno_common::db::SqliteEventStore;
use vanno_common::registry::{SliderRegistry, VideoRegistry};
use vanno_rv::{build_router, ActiveStore, AppState};

/// Command-line arguments for vanno-rv
#[derive(Parser, Debug)]
#[command(name = "vanno-rv")]
#[command(about = "Researcher view for vanno video-annotation studies")]
#[command(version)]
struct Args {
    /// Bootstrap configuration file
    #[arg(short, long, default_value = "vanno.toml", env = "VANNO_CONFIG")]
    config: PathBuf,

    /// Folder holding databases and registry files
    #[arg(short, long, env = "VANNO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "VANNO_RV_PORT")]
    port: Option<u16>,

    /// Database profile to open (overrides the config file)
    #[arg(short, long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_found = args.config.exists();
    let config = TomlConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    init_tracing(&config)?;

    info!(
        "Starting vanno researcher view (vanno-rv) v{}",
        env!("CARGO_PKG_VERSION")
    );
    if config_found {
        info!("Configuration: {}", args.config.display());
    } else {
        info!(
            "Configuration file {} not found, using defaults",
            args.config.display()
        );
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let database = args
        .database
        .clone()
        .unwrap_or_else(|| config.default_database.clone());
    let db_path = config.database_path(&root_folder, &database)?;
    let store = match SqliteEventStore::open(&db_path).await {
        Ok(store) => {
            info!("✓ Opened database '{}' at {}", database, db_path.display());
            store
        }
        Err(e) => {
            error!("Failed to open database {}: {}", db_path.display(), e);
            return Err(e.into());
        }
    };

    let videos = VideoRegistry::load(&config.videos_path(&root_folder))?;
    let sliders = SliderRegistry::load(&config.sliders_path(&root_folder))?;
    info!(
        "Loaded {} video(s) and {} slider(s)",
        videos.list().len(),
        sliders.list().len()
    );

    let port = args.port.unwrap_or(config.port);
    let state = AppState::new(
        config,
        root_folder,
        ActiveStore::new(&database, Arc::new(store)),
        videos,
        sliders,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind to port {}", port))?;
    info!("vanno-rv listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("vanno-rv stopped");
    Ok(())
}

/// Log to stderr, or to the configured file; `RUST_LOG` overrides the level
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let level = &config.logging.level;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vanno_rv={level},vanno_common={level},tower_http={level}"
        ))
    });

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

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
            Ok(mut stream) => {
                stream.recv().await;
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
