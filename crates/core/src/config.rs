//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services, so
//! request handling never reads process-wide environment variables.

use crate::constants::{MAX_TOKEN_TTL_SECS, USERNAME_INDEX_DIR_NAME, USERS_DIR_NAME};
use crate::{VaultError, VaultResult};
use imgvault_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    root_label: NonEmptyText,
    token_ttl: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The data directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidInput` for an empty root label or a token TTL that is zero
    /// or longer than [`MAX_TOKEN_TTL_SECS`], and
    /// `VaultError::StorageDirCreation` if the data directory cannot be created.
    pub fn new(data_dir: PathBuf, root_label: &str, token_ttl: Duration) -> VaultResult<Self> {
        let root_label = NonEmptyText::new(root_label)
            .map_err(|_| VaultError::InvalidInput("root label cannot be empty".into()))?;

        if token_ttl.is_zero() {
            return Err(VaultError::InvalidInput(
                "token TTL must be greater than zero".into(),
            ));
        }

        if token_ttl.as_secs() > MAX_TOKEN_TTL_SECS {
            return Err(VaultError::InvalidInput(format!(
                "token TTL cannot exceed {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }

        let data_dir = ensure_data_dir(&data_dir)?;

        Ok(Self {
            data_dir,
            root_label,
            token_ttl,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join(USERS_DIR_NAME)
    }

    pub fn username_index_dir(&self) -> PathBuf {
        self.users_dir().join(USERNAME_INDEX_DIR_NAME)
    }

    pub fn root_label(&self) -> &str {
        self.root_label.as_str()
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }
}

/// Create `path` if it does not exist and check that it is a directory.
pub fn ensure_data_dir(path: &Path) -> VaultResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(VaultError::InvalidInput("data directory cannot be empty".into()));
    }

    std::fs::create_dir_all(path).map_err(VaultError::StorageDirCreation)?;

    if !path.is_dir() {
        return Err(VaultError::InvalidInput(format!(
            "data directory {} is not a directory",
            path.display()
        )));
    }

    Ok(path.to_path_buf())
}

/// Parse a whole number of seconds from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `default_secs`. Zero is rejected.
pub fn duration_secs_from_env_value(
    name: &str,
    value: Option<String>,
    default_secs: u64,
) -> VaultResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let secs = match value {
        Some(v) => v.parse::<u64>().map_err(|_| {
            VaultError::InvalidInput(format!("{name} must be a whole number of seconds"))
        })?,
        None => default_secs,
    };

    if secs == 0 {
        return Err(VaultError::InvalidInput(format!("{name} must be greater than zero")));
    }

    Ok(Duration::from_secs(secs))
}
