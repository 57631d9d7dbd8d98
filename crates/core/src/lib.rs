//! # ImgVault Core
//!
//! Core business logic for the ImgVault image store.
//!
//! This crate contains the data operations behind every request:
//! - Identity: signup, credential checks and signed bearer tokens
//! - Hierarchy: per-user folder trees with ownership and emptiness rules
//! - Images: upload and deletion through the blob collaborator
//! - Search: literal, case-insensitive name search
//! - Record persistence: sharded YAML records under `IMGVAULT_DATA_DIR`
//!
//! **No API concerns**: HTTP servers, request parsing and status codes belong in `api-rest` or
//! `api-shared`.
//!
//! All operations are synchronous. Callers that need deadlines run them on a blocking pool.

pub mod config;
pub mod constants;
pub mod error;
pub mod hierarchy;
pub mod identity;
pub mod ids;
pub mod images;
pub mod models;
pub mod records;
pub mod search;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use config::{duration_secs_from_env_value, CoreConfig};
pub use error::{VaultError, VaultResult};
pub use hierarchy::{HierarchyReport, HierarchyService};
pub use identity::{IdentityService, IssuedToken, TokenSigner};
pub use ids::{parse_optional_folder_id, FolderId, ImageId, UserId};
pub use images::{ImageService, NewImage};
pub use models::{Folder, Image, PathSegment, User};
pub use records::RecordStore;
pub use search::SearchService;

pub use imgvault_files::{BlobStore, FilesError, FilesService};
pub use imgvault_types::{EmailAddress, NonEmptyText, TextError};
