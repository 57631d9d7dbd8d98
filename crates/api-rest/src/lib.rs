//! # API REST
//!
//! REST API implementation for ImgVault.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, multipart uploads, CORS, bearer auth)
//!
//! Core operations are synchronous; every handler runs them on the blocking pool under the
//! configured operation timeout. Uses `api-shared` for the wire types.

#![warn(rust_2018_idioms)]

mod auth;
mod blocking;
pub mod config;
mod error;
mod handlers;

pub use auth::AuthUser;
pub use config::ServerConfig;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use imgvault_core::{
    BlobStore, FilesService, HierarchyService, IdentityService, ImageService, RecordStore,
    SearchService, TokenSigner,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and the text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across REST API handlers.
///
/// Every process-wide handle (record store, blob store, token signer) is built once here and
/// shared through the services.
#[derive(Clone)]
pub struct AppState {
    identity: IdentityService,
    hierarchy: HierarchyService,
    images: ImageService,
    search: SearchService,
    files: Arc<FilesService>,
    operation_timeout: Duration,
    max_upload_bytes: usize,
}

impl AppState {
    /// Opens the record store and blob bucket and loads (or generates) the token key.
    pub fn new(cfg: &ServerConfig) -> anyhow::Result<Self> {
        let store = Arc::new(RecordStore::open(&cfg.core)?);

        std::fs::create_dir_all(&cfg.blob_dir)?;
        let files = Arc::new(FilesService::new(
            &cfg.blob_dir,
            &cfg.bucket,
            &cfg.public_url_base,
        )?);
        let blobs: Arc<dyn BlobStore> = files.clone();

        let signer = match &cfg.token_key {
            Some(source) => TokenSigner::load(source)?,
            None => {
                tracing::warn!(
                    "IMGVAULT_TOKEN_KEY is not set; tokens will not survive a restart"
                );
                TokenSigner::generate()
            }
        };

        Ok(Self {
            identity: IdentityService::new(&cfg.core, Arc::clone(&store), Arc::new(signer))?,
            hierarchy: HierarchyService::new(Arc::clone(&cfg.core), Arc::clone(&store)),
            images: ImageService::new(Arc::clone(&store), blobs),
            search: SearchService::new(store),
            files,
            operation_timeout: cfg.operation_timeout,
            max_upload_bytes: cfg.max_upload_bytes,
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::signup,
        handlers::login,
        handlers::list_folders,
        handlers::create_folder,
        handlers::delete_folder,
        handlers::folder_path,
        handlers::upload_image,
        handlers::list_images,
        handlers::delete_image,
        handlers::search_images,
        handlers::get_blob,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::MessageRes,
        api_shared::SignupReq,
        api_shared::LoginReq,
        api_shared::LoginRes,
        api_shared::FolderRes,
        api_shared::CreateFolderReq,
        api_shared::ImageRes,
        api_shared::UploadImageForm,
        api_shared::PathSegmentRes,
    )),
    modifiers(&BearerAuth)
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Builds the full router: API routes, blob serving, Swagger UI, tracing and CORS.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route(
            "/folders",
            get(handlers::list_folders).post(handlers::create_folder),
        )
        .route("/folders/:id", delete(handlers::delete_folder))
        .route("/folders/:id/path", get(handlers::folder_path))
        .route(
            "/images",
            get(handlers::list_images).post(handlers::upload_image),
        )
        .route("/images/:id", delete(handlers::delete_image))
        .route("/search", get(handlers::search_images))
        .route("/blobs/:bucket/*key", get(handlers::get_blob))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Builds the state and serves the router on `cfg.rest_addr` until the server stops.
pub async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
    let app = router(AppState::new(&cfg)?);

    tracing::info!("++ Starting ImgVault REST on {}", cfg.rest_addr);
    tracing::info!(
        data_dir = %cfg.core.data_dir().display(),
        blob_dir = %cfg.blob_dir.display(),
        bucket = %cfg.bucket,
        "storage configured"
    );

    let listener = tokio::net::TcpListener::bind(&cfg.rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
