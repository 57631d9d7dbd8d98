//! ImgVault blob storage
//!
//! This crate is the blob collaborator for ImgVault: an opaque object store that accepts
//! `(key, bytes, content type)` and hands back a locator plus a public URL, and that deletes
//! blobs by locator. The core never inspects blob content beyond a best-effort media type
//! sniff.
//!
//! ## Design Principles
//!
//! - Record data (users, folders, image records) and blob bytes are deliberately separated
//! - Blobs are immutable once stored (a new upload always gets a new key)
//! - Keys are namespaced per owner and folder for operational traceability
//! - Deleting an absent blob succeeds, matching object-store semantics
//!
//! ## Bucket Layout
//!
//! ```text
//! <blob_root>/
//! └── <bucket>/
//!     └── <owner_id>/
//!         └── <folder_id | root>/
//!             └── <uuid>-<sanitised filename>
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use imgvault_files::{BlobStore, FilesService, StorageKey};
//! use imgvault_uuid::ShardableUuid;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(
//!     Path::new("imgvault_data/blobs"),
//!     "imgvault",
//!     "http://localhost:3000/blobs/{bucket}",
//! )?;
//!
//! let owner = ShardableUuid::new();
//! let key = StorageKey::for_upload(&owner, None, "beach.jpg");
//! let stored = service.store(&key, b"...", "image/jpeg")?;
//! println!("{}", stored.public_url);
//! # Ok(())
//! # }
//! ```

mod blob;
mod constants;
mod files;
mod key;

pub use blob::{BlobStore, StoredBlob};
pub use constants::{BUCKET_PLACEHOLDER, ROOT_KEY_SEGMENT};
pub use files::{sniff_media_type, FileMetadata, FilesService};
pub use key::{sanitise_filename, StorageKey};

/// Errors that can occur during blob operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Bucket name is not usable
    #[error("Invalid bucket name: {0}")]
    InvalidBucket(String),

    /// Storage key failed validation (potential directory traversal or unsafe path)
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// A blob already exists under this key (immutability violation)
    #[error("Blob already exists: {0}")]
    FileAlreadyExists(String),

    /// No blob stored under this key
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The store could not be reached or refused the operation
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
