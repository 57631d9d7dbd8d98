//! Image records and their blobs.
//!
//! Upload stores the blob first and then the record; delete removes the blob first and then the
//! record. A failure between the two steps can therefore leak a blob but never leaves a record
//! pointing at a missing blob.

use crate::ids::{FolderId, ImageId, UserId};
use crate::models::Image;
use crate::records::RecordStore;
use crate::validation::{is_image_content_type, validate_image_name};
use crate::{VaultError, VaultResult};
use chrono::Utc;
use imgvault_files::{sniff_media_type, BlobStore, StorageKey};
use std::sync::Arc;

/// An upload as received from a client.
#[derive(Clone, Copy, Debug)]
pub struct NewImage<'a> {
    pub name: &'a str,
    pub folder_id: Option<&'a FolderId>,
    pub original_filename: &'a str,
    /// Content type declared by the client; may be empty.
    pub content_type: &'a str,
    pub content: &'a [u8],
}

#[derive(Clone, Debug)]
pub struct ImageService {
    store: Arc<RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

impl ImageService {
    pub fn new(store: Arc<RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Images directly inside `folder`, or exactly the root-level images when `folder` is
    /// `None`. A folder the user does not own simply has no images.
    pub fn list_images(&self, user: &UserId, folder: Option<&FolderId>) -> VaultResult<Vec<Image>> {
        let mut images = self.store.list_images(user)?;
        images.retain(|i| i.folder_id.as_ref() == folder);
        Ok(images)
    }

    /// Stores the blob and then records the image.
    ///
    /// # Errors
    ///
    /// - `VaultError::InvalidInput` for an unusable name, empty content or a non-image type.
    /// - `VaultError::InvalidFolder` if the folder is not owned by `user`, including when it
    ///   is deleted while the blob is being stored.
    /// - `VaultError::UploadFailed` if the blob store fails; no record is created.
    pub fn upload_image(&self, user: &UserId, upload: NewImage<'_>) -> VaultResult<Image> {
        let name = validate_image_name(upload.name)?;

        if upload.content.is_empty() {
            return Err(VaultError::InvalidInput("image content cannot be empty".into()));
        }

        let content_type = resolve_content_type(upload.content_type, upload.content)
            .ok_or_else(|| {
                tracing::warn!(
                    %user,
                    declared = upload.content_type,
                    "upload rejected: not an image"
                );
                VaultError::InvalidInput("uploaded file is not an image".into())
            })?;

        if let Some(folder_id) = upload.folder_id {
            if self.store.read_folder(user, folder_id)?.is_none() {
                tracing::warn!(%user, folder = %folder_id, "upload rejected: unknown folder");
                return Err(VaultError::InvalidFolder);
            }
        }

        let key = StorageKey::for_upload(
            user.as_uuid(),
            upload.folder_id.map(FolderId::as_uuid),
            upload.original_filename,
        );

        let stored = self
            .blobs
            .store(&key, upload.content, &content_type)
            .map_err(|e| {
                tracing::error!(%user, %key, "blob upload failed: {}", e);
                VaultError::UploadFailed(e)
            })?;

        let image = Image {
            id: ImageId::new(),
            name,
            folder_id: upload.folder_id.cloned(),
            user_id: user.clone(),
            blob_locator: stored.locator,
            url: stored.public_url,
            content_type,
            size_bytes: stored.metadata.size_bytes,
            created_at: Utc::now(),
        };

        let recorded = self.store.with_user_lock(user, || {
            if let Some(folder_id) = &image.folder_id {
                if self.store.read_folder(user, folder_id)?.is_none() {
                    tracing::warn!(%user, folder = %folder_id, "folder removed during upload");
                    return Err(VaultError::InvalidFolder);
                }
            }
            self.store.write_image(&image)
        });

        if let Err(e) = recorded {
            self.discard_blob(&image.blob_locator);
            return Err(e);
        }

        tracing::info!(%user, image = %image.id, size = image.size_bytes, "image uploaded");
        Ok(image)
    }

    /// Deletes the blob and then the record.
    ///
    /// # Errors
    ///
    /// - `VaultError::NotFound` if `user` has no such image.
    /// - `VaultError::DeleteFailed` if the blob store fails; the record is kept.
    pub fn delete_image(&self, user: &UserId, image_id: &ImageId) -> VaultResult<()> {
        self.store.with_user_lock(user, || {
            let image = self
                .store
                .read_image(user, image_id)?
                .ok_or(VaultError::NotFound)?;

            self.blobs.delete(&image.blob_locator).map_err(|e| {
                tracing::error!(%user, image = %image_id, "blob delete failed: {}", e);
                VaultError::DeleteFailed(e)
            })?;

            self.store.remove_image(user, image_id)?;
            tracing::info!(%user, image = %image_id, "image deleted");
            Ok(())
        })
    }

    fn discard_blob(&self, locator: &str) {
        if let Err(e) = self.blobs.delete(locator) {
            tracing::error!(locator, "failed to discard orphaned blob: {}", e);
        }
    }
}

/// The declared type if it is an image type, else the sniffed type if that is one.
fn resolve_content_type(declared: &str, content: &[u8]) -> Option<String> {
    if is_image_content_type(declared) {
        return Some(declared.trim().to_ascii_lowercase());
    }

    sniff_media_type(content)
        .filter(|sniffed| is_image_content_type(sniffed))
        .map(str::to_string)
}
