//! Typed records persisted by the record store.

use crate::ids::{FolderId, ImageId, UserId};
use chrono::{DateTime, Utc};
use imgvault_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};

/// A registered account. Immutable after signup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub email: EmailAddress,
    pub created_at: DateTime<Utc>,
}

/// A named container in a user's tree. `parent_folder_id == None` means the folder sits at root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: NonEmptyText,
    pub user_id: UserId,
    pub parent_folder_id: Option<FolderId>,
    pub created_at: DateTime<Utc>,
}

/// A named reference to a stored blob. `folder_id == None` means the image sits at root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub name: NonEmptyText,
    pub folder_id: Option<FolderId>,
    pub user_id: UserId,
    /// Opaque blob-store locator, used for deletion.
    pub blob_locator: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// One breadcrumb entry. The root sentinel has `id == None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    pub id: Option<FolderId>,
    pub name: String,
}

/// Entry in the username reservation index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UsernameEntry {
    pub user_id: UserId,
    pub username: String,
}

/// Records carrying an owner and a creation time, listed in a stable order.
pub(crate) trait OwnedRecord {
    fn owner(&self) -> &UserId;
    fn record_id(&self) -> String;
    fn created_at(&self) -> DateTime<Utc>;
}

impl OwnedRecord for Folder {
    fn owner(&self) -> &UserId {
        &self.user_id
    }

    fn record_id(&self) -> String {
        self.id.to_string()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl OwnedRecord for Image {
    fn owner(&self) -> &UserId {
        &self.user_id
    }

    fn record_id(&self) -> String {
        self.id.to_string()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Orders records by creation time, then id.
pub(crate) fn sort_records<T: OwnedRecord>(records: &mut [T]) {
    records.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.record_id().cmp(&b.record_id()))
    });
}
