//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without loading a `.env` file.
//!
//! ## Intended use
//! Useful for development and debugging against an explicitly exported environment. The
//! workspace's main `imgvault-run` binary loads `.env` first and then runs the same server.

use api_rest::ServerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the ImgVault REST API server
///
/// # Environment Variables
/// - `IMGVAULT_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `IMGVAULT_DATA_DIR`: Directory for records (default: "imgvault_data")
/// - `IMGVAULT_BLOB_DIR`, `IMGVAULT_BUCKET`, `IMGVAULT_PUBLIC_URL_BASE`: blob storage
/// - `IMGVAULT_TOKEN_KEY`, `IMGVAULT_TOKEN_TTL_SECS`: bearer tokens
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or storage cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("imgvault_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = ServerConfig::from_env()?;
    api_rest::serve(cfg).await
}
