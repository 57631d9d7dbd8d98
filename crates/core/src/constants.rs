//! Constants used throughout the ImgVault core crate.
//!
//! Path and filename constants live here so the on-disk layout is defined in one place.

/// Directory under the data dir holding every user's records.
pub const USERS_DIR_NAME: &str = "users";

/// Directory under `users/` holding the username reservation index.
pub const USERNAME_INDEX_DIR_NAME: &str = "index";

/// Directory under a user's record dir holding folder records.
pub const FOLDERS_DIR_NAME: &str = "folders";

/// Directory under a user's record dir holding image records.
pub const IMAGES_DIR_NAME: &str = "images";

/// Filename for the user record.
pub const USER_RECORD_FILENAME: &str = "user.yaml";

/// Extension used for every YAML record.
pub const RECORD_EXTENSION: &str = "yaml";

/// Default directory for ImgVault data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "imgvault_data";

/// Label of the root breadcrumb segment.
pub const DEFAULT_ROOT_LABEL: &str = "My Drive";

/// Default bearer token lifetime (24 hours).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;

/// Longest accepted bearer token lifetime (10 years).
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 86_400;

/// Longest folder or image display name, in characters.
pub const MAX_NAME_CHARS: usize = 255;

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 64;
pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 1024;
