//! Server configuration.
//!
//! Resolved once at startup from environment variables. [`ServerConfig::from_lookup`] takes the
//! lookup as a function so tests never touch the process environment.

use imgvault_core::constants::{DEFAULT_DATA_DIR, DEFAULT_ROOT_LABEL, DEFAULT_TOKEN_TTL_SECS};
use imgvault_core::{duration_secs_from_env_value, CoreConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_BUCKET: &str = "imgvault";
pub const DEFAULT_PUBLIC_URL_BASE: &str = "http://localhost:3000/blobs/{bucket}";
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Everything the REST server needs, resolved at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub rest_addr: String,
    pub core: Arc<CoreConfig>,
    pub blob_dir: PathBuf,
    pub bucket: String,
    pub public_url_base: String,
    /// PKCS#8 PEM (inline, path or base64). `None` means an ephemeral key.
    pub token_key: Option<String>,
    pub operation_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, applying defaults for unset or blank values.
    ///
    /// # Errors
    ///
    /// Returns an error for unparseable numbers, a zero TTL/timeout/upload limit, or a data
    /// directory that cannot be created.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir =
            PathBuf::from(get("IMGVAULT_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into()));
        let root_label = get("IMGVAULT_ROOT_LABEL").unwrap_or_else(|| DEFAULT_ROOT_LABEL.into());
        let token_ttl = duration_secs_from_env_value(
            "IMGVAULT_TOKEN_TTL_SECS",
            get("IMGVAULT_TOKEN_TTL_SECS"),
            DEFAULT_TOKEN_TTL_SECS,
        )?;
        let operation_timeout = duration_secs_from_env_value(
            "IMGVAULT_OPERATION_TIMEOUT_SECS",
            get("IMGVAULT_OPERATION_TIMEOUT_SECS"),
            DEFAULT_OPERATION_TIMEOUT_SECS,
        )?;

        let max_upload_bytes = match get("IMGVAULT_MAX_UPLOAD_BYTES") {
            Some(v) => v.parse::<usize>().map_err(|_| {
                anyhow::anyhow!("IMGVAULT_MAX_UPLOAD_BYTES must be a whole number of bytes")
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };
        if max_upload_bytes == 0 {
            anyhow::bail!("IMGVAULT_MAX_UPLOAD_BYTES must be greater than zero");
        }

        let core = Arc::new(CoreConfig::new(data_dir, &root_label, token_ttl)?);
        let blob_dir = get("IMGVAULT_BLOB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| core.data_dir().join("blobs"));

        Ok(Self {
            rest_addr: get("IMGVAULT_REST_ADDR").unwrap_or_else(|| DEFAULT_REST_ADDR.into()),
            core,
            blob_dir,
            bucket: get("IMGVAULT_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.into()),
            public_url_base: get("IMGVAULT_PUBLIC_URL_BASE")
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL_BASE.into()),
            token_key: get("IMGVAULT_TOKEN_KEY"),
            operation_timeout,
            max_upload_bytes,
        })
    }
}
