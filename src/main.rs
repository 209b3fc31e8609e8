//! Depot daemon
//!
//! Content-addressed upload server: accepts file and image uploads, persists
//! them under their content hash, thumbnails images, serves bytes back.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! depot
//!
//! # Start with custom config
//! depot --config /path/to/config.toml
//!
//! # Start with custom port and storage directory
//! depot --port 9001 --storage-dir /data/uploads
//!
//! # Surface thumbnail failures loudly
//! depot --diagnostic
//! ```

use clap::Parser;
use depot::{Config, HttpServer, Mode};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(about = "Content-addressed file and image upload daemon")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "DEPOT_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Bind host
    #[arg(long, env = "DEPOT_HOST")]
    host: Option<String>,

    /// Bind port
    #[arg(short, long, env = "DEPOT_PORT")]
    port: Option<u16>,

    /// Diagnostic mode: log thumbnail failures at error level
    #[arg(long)]
    diagnostic: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("depot=info".parse()?))
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.diagnostic {
        config.mode = Mode::Diagnostic;
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        host = %config.host,
        port = config.port,
        mode = ?config.mode,
        "Starting depot"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let server = Arc::new(HttpServer::from_config(&config, addr).await?);

    info!("HTTP API available at http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /                      - Upload form");
    info!("  POST /upload/image          - Upload an image (multipart field 'file')");
    info!("  POST /upload/file           - Upload a file (multipart field 'file')");
    info!("  GET  /image/{{filename}}      - Origin image");
    info!("  GET  /thumbnail/{{filename}}  - Thumbnail (origin fallback)");
    info!("  GET  /file/{{filename}}       - Stored file");
    info!("  GET  /download/{{filename}}   - Stored file as attachment");

    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    Ok(())
}
