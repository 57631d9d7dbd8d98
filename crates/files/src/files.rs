//! Filesystem-backed bucket implementation of the blob collaborator
//!
//! [`FilesService`] stores each blob as a plain file under `<root>/<bucket>/<key>`. It stands in
//! for a hosted object store: the public URL it hands out is a pure function of the configured
//! URL base, the bucket name and the key, so records persisted today keep resolving as long as
//! those three are unchanged.
//!
//! # Security Model
//!
//! - The root directory is canonicalised once at construction
//! - Keys are validated segment by segment ([`StorageKey`]) before touching the filesystem
//! - Writes go to a temporary sibling and are renamed into place, so readers never observe a
//!   partially written blob
//! - Existing blobs are never overwritten

use crate::constants::BUCKET_PLACEHOLDER;
use crate::{BlobStore, FilesError, StorageKey, StoredBlob};
use chrono::{DateTime, Utc};
use imgvault_types::NonEmptyText;
use imgvault_uuid::ShardableUuid;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Metadata for a stored blob
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Hashing algorithm used (always "sha256" for current implementation)
    pub hash_algorithm: NonEmptyText,

    /// Hexadecimal digest of the blob content
    pub hash: String,

    /// Size of the blob in bytes
    pub size_bytes: u64,

    /// Content type declared by the uploader
    pub declared_content_type: NonEmptyText,

    /// Detected media type (MIME type), if available
    ///
    /// This is a best-effort detection from magic bytes and should not be considered
    /// authoritative.
    pub media_type: Option<NonEmptyText>,

    /// UTC timestamp when the blob was stored
    pub stored_at: DateTime<Utc>,
}

/// Best-effort media type detection from the leading bytes of `content`.
pub fn sniff_media_type(content: &[u8]) -> Option<&'static str> {
    infer::get(content).map(|kind| kind.mime_type())
}

/// Filesystem bucket store
#[derive(Debug)]
pub struct FilesService {
    /// Canonicalised root directory containing buckets
    root_directory: PathBuf,

    bucket: NonEmptyText,

    /// URL base with `{bucket}` already substituted and no trailing slash
    public_url_base: String,
}

impl FilesService {
    /// Creates a new `FilesService` for `bucket` under `root_directory`.
    ///
    /// The bucket directory is created if missing. `public_url_base` may contain a `{bucket}`
    /// placeholder, e.g. `https://{bucket}.s3.amazonaws.com`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - The root directory does not exist or is not a directory
    /// - The bucket name is not 3-63 characters of `[a-z0-9.-]`
    /// - The bucket directory cannot be created
    pub fn new(
        root_directory: &Path,
        bucket: &str,
        public_url_base: &str,
    ) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let bucket = Self::validate_bucket(bucket)?;

        fs::create_dir_all(root_directory.join(bucket.as_str()))?;

        let public_url_base = public_url_base
            .trim()
            .trim_end_matches('/')
            .replace(BUCKET_PLACEHOLDER, bucket.as_str());

        Ok(Self {
            root_directory,
            bucket,
            public_url_base,
        })
    }

    fn validate_bucket(bucket: &str) -> Result<NonEmptyText, FilesError> {
        let valid_len = (3..=63).contains(&bucket.len());
        let valid_chars = bucket
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-'));
        let valid_edges = !bucket.starts_with(['.', '-']) && !bucket.ends_with(['.', '-']);

        if !(valid_len && valid_chars && valid_edges) || bucket.contains("..") {
            return Err(FilesError::InvalidBucket(bucket.to_owned()));
        }

        NonEmptyText::new(bucket).map_err(|_| FilesError::InvalidBucket(bucket.to_owned()))
    }

    pub fn bucket(&self) -> &str {
        self.bucket.as_str()
    }

    /// Public URL for `key`: `<url base>/<key>`.
    pub fn public_url(&self, key: &StorageKey) -> String {
        format!("{}/{}", self.public_url_base, key)
    }

    /// Writes `content` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - A blob already exists under `key` (immutability violation)
    /// - Directory creation or the write fails (I/O)
    pub fn put(
        &self,
        key: &StorageKey,
        content: &[u8],
        content_type: &str,
    ) -> Result<FileMetadata, FilesError> {
        let declared_content_type = NonEmptyText::new(content_type)
            .unwrap_or_else(|_| Self::literal("application/octet-stream"));

        let storage_path = self.compute_storage_path(key);

        if storage_path.exists() {
            return Err(FilesError::FileAlreadyExists(key.to_string()));
        }

        let temp_path = storage_path.with_extension(format!("tmp-{}", ShardableUuid::new()));
        write_creating_parent(&temp_path, content)?;

        if let Err(e) = fs::rename(&temp_path, &storage_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(FilesError::Io(e));
        }

        let hash = hex::encode(Sha256::digest(content));

        let media_type = sniff_media_type(content).and_then(|mime| NonEmptyText::new(mime).ok());

        Ok(FileMetadata {
            hash_algorithm: Self::literal("sha256"),
            hash,
            size_bytes: content.len() as u64,
            declared_content_type,
            media_type,
            stored_at: Utc::now(),
        })
    }

    /// Reads the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::NotFound`] if there is no such blob, or an I/O error.
    pub fn read(&self, key: &StorageKey) -> Result<Vec<u8>, FilesError> {
        let storage_path = self.compute_storage_path(key);

        match fs::read(&storage_path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FilesError::NotFound(key.to_string()))
            }
            Err(e) => Err(FilesError::Io(e)),
        }
    }

    /// Removes the blob stored under `key`, then prunes directories left empty below the
    /// bucket. Returns `false` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the blob exists but cannot be removed.
    pub fn remove(&self, key: &StorageKey) -> Result<bool, FilesError> {
        let storage_path = self.compute_storage_path(key);

        match fs::remove_file(&storage_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(FilesError::Io(e)),
        }

        let bucket_dir = self.bucket_directory();
        let mut dir = storage_path.parent();
        while let Some(current) = dir {
            if current == bucket_dir || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }

        Ok(true)
    }

    /// Absolute path for `key`: `<root>/<bucket>/<segment>/<segment>/...`.
    fn compute_storage_path(&self, key: &StorageKey) -> PathBuf {
        key.segments()
            .fold(self.bucket_directory(), |path, segment| path.join(segment))
    }

    fn bucket_directory(&self) -> PathBuf {
        self.root_directory.join(self.bucket.as_str())
    }
}

/// Attempts at writing a blob while a concurrent `remove` prunes its directory.
const WRITE_ATTEMPTS: usize = 3;

/// Writes `content` to `path`, creating missing parent directories. A parent pruned by a
/// concurrent [`FilesService::remove`] between creation and write is recreated.
fn write_creating_parent(path: &Path, content: &[u8]) -> Result<(), FilesError> {
    let parent = path.parent().ok_or_else(|| {
        FilesError::InvalidKey(format!("storage path {} has no parent", path.display()))
    })?;

    let mut attempt = 1;
    loop {
        match fs::write(path, content) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound && attempt < WRITE_ATTEMPTS => {
                attempt += 1;
                fs::create_dir_all(parent).map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create storage directory {}: {}",
                            parent.display(),
                            e
                        ),
                    ))
                })?;
            }
            Err(e) => {
                return Err(FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write blob to {}: {}", path.display(), e),
                )))
            }
        }
    }
}

impl FilesService {
    #[cfg(test)]
    fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    fn literal(text: &'static str) -> NonEmptyText {
        NonEmptyText::new(text).expect("literal is non-empty")
    }
}

impl BlobStore for FilesService {
    fn store(
        &self,
        key: &StorageKey,
        content: &[u8],
        content_type: &str,
    ) -> Result<StoredBlob, FilesError> {
        let metadata = self.put(key, content, content_type)?;
        tracing::debug!(key = %key, size = metadata.size_bytes, "blob stored");

        Ok(StoredBlob {
            locator: key.to_string(),
            public_url: self.public_url(key),
            metadata,
        })
    }

    fn delete(&self, locator: &str) -> Result<(), FilesError> {
        let key = StorageKey::parse(locator)?;
        if !self.remove(&key)? {
            tracing::warn!(key = %key, "blob already absent on delete");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn test_service(temp: &TempDir) -> FilesService {
        FilesService::new(temp.path(), "imgvault", "http://localhost:3000/blobs/{bucket}")
            .expect("service should construct")
    }

    fn test_key() -> StorageKey {
        StorageKey::for_upload(&ShardableUuid::new(), None, "beach.jpg")
    }

    #[test]
    fn test_new_root_not_exists() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("non-existent");

        let service = FilesService::new(&root, "imgvault", "http://x");
        assert!(matches!(service, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_new_root_not_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();

        let service = FilesService::new(&root, "imgvault", "http://x");
        assert!(matches!(service, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_new_rejects_bad_bucket_names() {
        let temp = TempDir::new().unwrap();
        for bad in ["ab", "Upper", "has space", "-edge", "edge.", "a..b", "../up"] {
            let service = FilesService::new(temp.path(), bad, "http://x");
            assert!(
                matches!(service, Err(FilesError::InvalidBucket(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_new_creates_bucket_directory() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);

        assert!(temp.path().join("imgvault").is_dir());
        assert_eq!(service.bucket(), "imgvault");
        assert!(service.root_directory().is_dir());
    }

    #[test]
    fn test_public_url_substitutes_bucket() {
        let temp = TempDir::new().unwrap();
        let service =
            FilesService::new(temp.path(), "photos", "https://{bucket}.s3.amazonaws.com/").unwrap();
        let key = StorageKey::parse("u/root/k-a.png").unwrap();

        assert_eq!(
            service.public_url(&key),
            "https://photos.s3.amazonaws.com/u/root/k-a.png"
        );
    }

    #[test]
    fn test_put_and_read() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);
        let key = test_key();

        let metadata = service.put(&key, b"Hello, World!", "text/plain").unwrap();

        assert_eq!(metadata.hash_algorithm.as_str(), "sha256");
        assert_eq!(metadata.size_bytes, 13);
        assert_eq!(metadata.hash.len(), 64);
        assert_eq!(metadata.declared_content_type.as_str(), "text/plain");
        assert_eq!(service.read(&key).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_put_detects_png() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);

        let metadata = service.put(&test_key(), &PNG_HEADER, "").unwrap();

        assert_eq!(
            metadata.media_type.as_ref().map(|t| t.as_str()),
            Some("image/png")
        );
        assert_eq!(
            metadata.declared_content_type.as_str(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_put_refuses_overwrite() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);
        let key = test_key();

        service.put(&key, b"first", "text/plain").unwrap();
        let second = service.put(&key, b"second", "text/plain");

        assert!(matches!(second, Err(FilesError::FileAlreadyExists(_))));
        assert_eq!(service.read(&key).unwrap(), b"first");
    }

    #[test]
    fn test_put_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);
        let key = test_key();

        service.put(&key, b"data", "text/plain").unwrap();

        let dir = service.compute_storage_path(&key);
        let entries: Vec<_> = fs::read_dir(dir.parent().unwrap())
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);

        assert!(matches!(
            service.read(&test_key()),
            Err(FilesError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_prunes_empty_directories() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);
        let key = test_key();
        service.put(&key, b"bytes", "image/jpeg").unwrap();

        assert!(service.remove(&key).unwrap());
        assert!(!service.remove(&key).unwrap());

        let bucket_dir = temp.path().join("imgvault");
        assert!(bucket_dir.is_dir());
        assert_eq!(fs::read_dir(&bucket_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_put_after_remove_pruned_the_directory() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);
        let owner = ShardableUuid::new();

        let first = StorageKey::for_upload(&owner, None, "a.jpg");
        service.put(&first, b"first", "image/jpeg").unwrap();
        assert!(service.remove(&first).unwrap());

        let second = StorageKey::for_upload(&owner, None, "b.jpg");
        service.put(&second, b"second", "image/jpeg").unwrap();
        assert_eq!(service.read(&second).unwrap(), b"second");
    }

    #[test]
    fn test_write_creating_parent_recreates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("owner").join("root").join("blob.tmp");

        write_creating_parent(&path, b"bytes").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"bytes");
    }

    #[test]
    fn test_blob_store_roundtrip_through_trait() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);
        let store: &dyn BlobStore = &service;
        let key = test_key();

        let stored = store.store(&key, &PNG_HEADER, "image/png").unwrap();
        assert_eq!(stored.locator, key.to_string());
        assert!(stored
            .public_url
            .starts_with("http://localhost:3000/blobs/imgvault/"));

        store.delete(&stored.locator).unwrap();
        assert!(matches!(service.read(&key), Err(FilesError::NotFound(_))));

        // Deleting again is fine: object stores treat missing keys as deleted.
        store.delete(&stored.locator).unwrap();
    }

    #[test]
    fn test_delete_rejects_malformed_locator() {
        let temp = TempDir::new().unwrap();
        let service = test_service(&temp);

        assert!(matches!(
            BlobStore::delete(&service, "../../etc/passwd"),
            Err(FilesError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_sniff_media_type() {
        assert_eq!(sniff_media_type(&PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_media_type(b"plain text"), None);
    }
}
