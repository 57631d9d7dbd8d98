//! Shared fixtures for unit tests.

use crate::config::CoreConfig;
use crate::hierarchy::HierarchyService;
use crate::identity::{IdentityService, TokenSigner};
use crate::images::ImageService;
use crate::records::RecordStore;
use crate::search::SearchService;
use imgvault_files::{
    BlobStore, FileMetadata, FilesError, FilesService, StorageKey, StoredBlob,
};
use imgvault_types::NonEmptyText;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A minimal PNG signature plus IHDR chunk header, enough for type sniffing.
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
    b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
];

type StoreHook = Box<dyn Fn() + Send + Sync>;

/// In-memory blob store whose calls can be made to fail.
#[derive(Default)]
pub(crate) struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_stores: AtomicBool,
    fail_deletes: AtomicBool,
    after_store: Mutex<Option<StoreHook>>,
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl MemoryBlobStore {
    pub(crate) fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub(crate) fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Runs `hook` once, right after the next successful store.
    pub(crate) fn after_next_store(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.after_store.lock().unwrap() = Some(Box::new(hook));
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(
        &self,
        key: &StorageKey,
        content: &[u8],
        content_type: &str,
    ) -> Result<StoredBlob, FilesError> {
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(FilesError::Unavailable("store refused".into()));
        }

        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), content.to_vec());

        let hook = self.after_store.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }

        Ok(StoredBlob {
            locator: key.to_string(),
            public_url: format!("http://blobs.test/bucket/{key}"),
            metadata: FileMetadata {
                hash_algorithm: NonEmptyText::new("sha256").unwrap(),
                hash: "0".repeat(64),
                size_bytes: content.len() as u64,
                declared_content_type: NonEmptyText::new(content_type).unwrap(),
                media_type: None,
                stored_at: chrono::Utc::now(),
            },
        })
    }

    fn delete(&self, locator: &str) -> Result<(), FilesError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(FilesError::Unavailable("delete refused".into()));
        }
        self.blobs.lock().unwrap().remove(locator);
        Ok(())
    }
}

/// A fully wired set of services over a temporary data directory.
pub(crate) struct TestVault {
    _temp: TempDir,
    pub cfg: Arc<CoreConfig>,
    pub store: Arc<RecordStore>,
    pub signer: Arc<TokenSigner>,
    pub blobs: Arc<MemoryBlobStore>,
    pub identity: IdentityService,
    pub hierarchy: HierarchyService,
    pub images: ImageService,
    pub search: SearchService,
}

impl TestVault {
    pub(crate) fn new() -> Self {
        Self::build(None)
    }

    pub(crate) fn with_failing_blobs() -> Self {
        let vault = Self::new();
        vault.blobs.fail_stores(true);
        vault
    }

    pub(crate) fn with_filesystem_blobs() -> Self {
        Self::build(Some("http://localhost:3000/blobs/{bucket}"))
    }

    fn build(filesystem_url_base: Option<&str>) -> Self {
        let temp = TempDir::new().unwrap();
        let cfg = Arc::new(
            CoreConfig::new(
                temp.path().join("data"),
                "My Drive",
                Duration::from_secs(3600),
            )
            .unwrap(),
        );
        let store = Arc::new(RecordStore::open(&cfg).unwrap());
        let signer = Arc::new(TokenSigner::generate());
        let blobs = Arc::new(MemoryBlobStore::default());

        let blob_store: Arc<dyn BlobStore> = match filesystem_url_base {
            Some(base) => {
                let root = temp.path().join("blobs");
                std::fs::create_dir_all(&root).unwrap();
                Arc::new(FilesService::new(&root, "test-bucket", base).unwrap())
            }
            None => blobs.clone(),
        };

        Self {
            identity: IdentityService::new(&cfg, Arc::clone(&store), Arc::clone(&signer)).unwrap(),
            hierarchy: HierarchyService::new(Arc::clone(&cfg), Arc::clone(&store)),
            images: ImageService::new(Arc::clone(&store), blob_store),
            search: SearchService::new(Arc::clone(&store)),
            _temp: temp,
            cfg,
            store,
            signer,
            blobs,
        }
    }
}
