use api_rest::ServerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the ImgVault application
///
/// Loads `.env`, then starts the REST server with Swagger UI. Records live under
/// `IMGVAULT_DATA_DIR` and image bytes under `IMGVAULT_BLOB_DIR`.
///
/// # Environment Variables
/// - `IMGVAULT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `IMGVAULT_DATA_DIR`: Directory for user, folder and image records (default: "imgvault_data")
/// - `IMGVAULT_ROOT_LABEL`: Display name of the root folder (default: "My Drive")
/// - `IMGVAULT_BLOB_DIR`: Directory for blob buckets
/// - `IMGVAULT_BUCKET`: Bucket name (default: "imgvault")
/// - `IMGVAULT_PUBLIC_URL_BASE`: Base of public image URLs; `{bucket}` is substituted
/// - `IMGVAULT_TOKEN_KEY`: PKCS#8 PEM signing key (inline, path or base64)
/// - `IMGVAULT_TOKEN_TTL_SECS`: Bearer token lifetime (default: 86400)
/// - `IMGVAULT_OPERATION_TIMEOUT_SECS`: Per-request storage deadline (default: 5)
/// - `IMGVAULT_MAX_UPLOAD_BYTES`: Largest accepted image
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

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
