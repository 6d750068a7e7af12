#![forbid(unsafe_code)]

//! API server binary. Runs the demo catalog in memory unless a database is
//! configured, in which case uploads go to the media service and records to
//! SQLite.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use videometa::{
    api::{AppState, router},
    config::{DEFAULT_CONFIG_PATH, RuntimeConfig, StorageMode, load_env_config, utf8_env_vars},
    library::VideoLibrary,
    store::{MemoryStore, SqliteStore},
    upload::CloudinaryUploader,
    video::{demo_catalog, fallback_catalog},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the video metadata API.")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the env file")]
    config: PathBuf,
    #[arg(short = 'p', long = "port", help = "Override the listening port")]
    port: Option<u16>,
    #[arg(long = "host", value_name = "ADDR", help = "Override the listening address")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let process_env = utf8_env_vars(std::env::vars_os());
    let mut runtime = load_env_config(&cli.config, process_env)?.resolve()?;
    if let Some(port) = cli.port {
        runtime.port = port;
    }
    if let Some(host) = cli.host {
        runtime.host = host;
    }

    let library = build_library(&runtime)?;
    let app = router(AppState::new(library), runtime.max_upload_bytes);

    let addr = SocketAddr::new(
        runtime
            .host
            .parse()
            .with_context(|| format!("parsing listen address {}", runtime.host))?,
        runtime.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn build_library(runtime: &RuntimeConfig) -> Result<VideoLibrary> {
    match &runtime.storage {
        StorageMode::Demo => {
            tracing::info!("no DATABASE_URL set; serving the in-memory demo catalog");
            Ok(VideoLibrary::new(Arc::new(MemoryStore::new(demo_catalog()))))
        }
        StorageMode::Persistent {
            database_path,
            credentials,
            folder,
            api_base,
        } => {
            let store = SqliteStore::open(database_path).context("initializing video database")?;
            let mut uploader =
                CloudinaryUploader::new(credentials.clone()).with_folder(folder.clone());
            if let Some(api_base) = api_base {
                uploader = uploader.with_api_base(api_base.clone());
            }
            tracing::info!(
                database = %database_path.display(),
                cloud = %credentials.cloud_name,
                "serving videos from the database"
            );
            Ok(VideoLibrary::new(Arc::new(store))
                .with_fallback(fallback_catalog())
                .with_uploader(Arc::new(uploader)))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", err);
    }
}
