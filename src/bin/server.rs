//! PikaWorld Sync Server
//!
//! Remote document service and identity provider for PikaWorld clients.
//! Workspaces mirrored by `pika` land here.
//!
//! # Configuration
//!
//! Environment variables:
//! - `PIKAWORLD_PORT`: Port to listen on (default: 8080)
//! - `PIKAWORLD_SERVER_DATA_DIR`: Directory for accounts and documents
//!   (default: ~/.local/share/pikaworld-server)
//! - `RUST_LOG`: Log filter (default: `pikaworld=info,pikaworld_server=info,tower_http=info`)
//!
//! See [`pikaworld::server::api`] for the endpoint list.

use pikaworld::server::{router, AccountStore, AppState, DocumentStore, ServerStorage};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Directory to store accounts and documents
    data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("PIKAWORLD_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("PIKAWORLD_SERVER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("pikaworld-server")
            });

        Self { port, data_dir }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pikaworld=info,pikaworld_server=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Config::from_env()).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;
    tracing::info!("Data directory: {}", config.data_dir.display());

    let storage = ServerStorage::new(&config.data_dir);
    let state = AppState {
        accounts: Arc::new(AccountStore::open(storage.clone())?),
        documents: Arc::new(DocumentStore::open(storage)?),
    };

    let app = router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
