//! The blob collaborator contract.

use crate::{FileMetadata, FilesError, StorageKey};

/// Result of a successful [`BlobStore::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Opaque locator used later to delete the blob.
    pub locator: String,
    /// Stable public URL for the blob. Persisted by callers, so its shape must not change.
    pub public_url: String,
    pub metadata: FileMetadata,
}

/// An opaque object store.
///
/// Implementations must be safe to share between request handlers. Both calls are
/// synchronous; callers that need a deadline run them on a blocking pool under a timeout.
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Stores `content` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the blob cannot be written. No blob is left behind on error.
    fn store(
        &self,
        key: &StorageKey,
        content: &[u8],
        content_type: &str,
    ) -> Result<StoredBlob, FilesError>;

    /// Deletes the blob addressed by `locator`. Deleting an absent blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the locator is malformed or the store refuses the delete.
    fn delete(&self, locator: &str) -> Result<(), FilesError>;
}
