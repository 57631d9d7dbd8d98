//! File-backed record store.
//!
//! Every record is one YAML document. A user's records live together under the user's sharded
//! directory:
//!
//! ```text
//! <data_dir>/users/
//!     index/<lowercased-username>.yaml
//!     <s1>/<s2>/<user_id>/
//!         user.yaml
//!         folders/<folder_id>.yaml
//!         images/<image_id>.yaml
//! ```
//!
//! Writes go to a temporary sibling file which is then renamed into place, so readers never
//! observe a partial record. Mutations of one user's tree are serialised in-process with
//! [`RecordStore::with_user_lock`]; separate processes sharing a data directory are not
//! serialised.

use crate::config::CoreConfig;
use crate::constants::{
    FOLDERS_DIR_NAME, IMAGES_DIR_NAME, RECORD_EXTENSION, USER_RECORD_FILENAME,
};
use crate::ids::{FolderId, ImageId, UserId};
use crate::models::{sort_records, Folder, Image, OwnedRecord, User, UsernameEntry};
use crate::{VaultError, VaultResult};
use imgvault_uuid::ShardableUuid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub struct RecordStore {
    users_dir: PathBuf,
    index_dir: PathBuf,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl RecordStore {
    /// Opens (and if necessary creates) the record directories under the configured data dir.
    pub fn open(cfg: &CoreConfig) -> VaultResult<Self> {
        let users_dir = cfg.users_dir();
        let index_dir = cfg.username_index_dir();
        fs::create_dir_all(&index_dir).map_err(VaultError::StorageDirCreation)?;

        Ok(Self {
            users_dir,
            index_dir,
            user_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Runs `f` while holding the write lock of `user`.
    ///
    /// The guarded data is `()`, so a poisoned lock carries no broken state and is recovered.
    pub fn with_user_lock<T>(
        &self,
        user: &UserId,
        f: impl FnOnce() -> VaultResult<T>,
    ) -> VaultResult<T> {
        let lock = {
            let mut locks = self
                .user_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(user.clone()).or_default())
        };

        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    fn user_dir(&self, user: &UserId) -> PathBuf {
        user.as_uuid().sharded_dir(&self.users_dir)
    }

    fn folder_path(&self, user: &UserId, folder: &FolderId) -> PathBuf {
        self.user_dir(user)
            .join(FOLDERS_DIR_NAME)
            .join(format!("{folder}.{RECORD_EXTENSION}"))
    }

    fn image_path(&self, user: &UserId, image: &ImageId) -> PathBuf {
        self.user_dir(user)
            .join(IMAGES_DIR_NAME)
            .join(format!("{image}.{RECORD_EXTENSION}"))
    }

    fn index_path(&self, username_key: &str) -> PathBuf {
        self.index_dir.join(format!("{username_key}.{RECORD_EXTENSION}"))
    }

    // Users

    /// Reserves a username. The index file is created exclusively, so exactly one of two
    /// concurrent signups for the same name wins.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::UsernameTaken` if the name is already reserved.
    pub(crate) fn reserve_username(
        &self,
        username_key: &str,
        entry: &UsernameEntry,
    ) -> VaultResult<()> {
        let yaml = serde_yaml::to_string(entry).map_err(VaultError::YamlSerialization)?;
        let path = self.index_path(username_key);

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(VaultError::UsernameTaken),
            Err(e) => return Err(VaultError::FileWrite(e)),
        };

        if let Err(e) = file.write_all(yaml.as_bytes()).and_then(|()| file.sync_all()) {
            let _ = fs::remove_file(&path);
            return Err(VaultError::FileWrite(e));
        }

        Ok(())
    }

    /// Releases a reservation made by a signup that failed afterwards.
    pub(crate) fn release_username(&self, username_key: &str) -> VaultResult<()> {
        remove_if_exists(&self.index_path(username_key)).map(|_| ())
    }

    pub(crate) fn lookup_username(&self, username_key: &str) -> VaultResult<Option<UserId>> {
        let entry: Option<UsernameEntry> = read_yaml(&self.index_path(username_key))?;
        Ok(entry.map(|e| e.user_id))
    }

    pub(crate) fn write_user(&self, user: &User) -> VaultResult<()> {
        let path = self.user_dir(&user.id).join(USER_RECORD_FILENAME);
        write_yaml_atomic(&path, user)
    }

    pub fn read_user(&self, user: &UserId) -> VaultResult<Option<User>> {
        let path = self.user_dir(user).join(USER_RECORD_FILENAME);
        let record: Option<User> = read_yaml(&path)?;

        match record {
            Some(record) if &record.id != user => Err(VaultError::CorruptRecord {
                path,
                reason: "user id does not match its directory".into(),
            }),
            other => Ok(other),
        }
    }

    // Folders

    pub(crate) fn write_folder(&self, folder: &Folder) -> VaultResult<()> {
        write_yaml_atomic(&self.folder_path(&folder.user_id, &folder.id), folder)
    }

    /// Reads a folder owned by `user`. A folder of another user is never found here, because
    /// records are stored under their owner's directory.
    pub fn read_folder(&self, user: &UserId, folder: &FolderId) -> VaultResult<Option<Folder>> {
        let path = self.folder_path(user, folder);
        let record: Option<Folder> = read_yaml(&path)?;
        record
            .map(|r| check_owned(r, user, &folder.to_string(), &path))
            .transpose()
    }

    pub(crate) fn remove_folder(&self, user: &UserId, folder: &FolderId) -> VaultResult<bool> {
        remove_if_exists(&self.folder_path(user, folder))
    }

    /// All folders of `user`, ordered by creation time then id.
    pub fn list_folders(&self, user: &UserId) -> VaultResult<Vec<Folder>> {
        list_owned(&self.user_dir(user).join(FOLDERS_DIR_NAME), user)
    }

    // Images

    pub(crate) fn write_image(&self, image: &Image) -> VaultResult<()> {
        write_yaml_atomic(&self.image_path(&image.user_id, &image.id), image)
    }

    pub fn read_image(&self, user: &UserId, image: &ImageId) -> VaultResult<Option<Image>> {
        let path = self.image_path(user, image);
        let record: Option<Image> = read_yaml(&path)?;
        record
            .map(|r| check_owned(r, user, &image.to_string(), &path))
            .transpose()
    }

    pub(crate) fn remove_image(&self, user: &UserId, image: &ImageId) -> VaultResult<bool> {
        remove_if_exists(&self.image_path(user, image))
    }

    /// All images of `user`, ordered by creation time then id.
    pub fn list_images(&self, user: &UserId) -> VaultResult<Vec<Image>> {
        list_owned(&self.user_dir(user).join(IMAGES_DIR_NAME), user)
    }
}

fn check_owned<T: OwnedRecord>(record: T, user: &UserId, id: &str, path: &Path) -> VaultResult<T> {
    if record.owner() != user || record.record_id() != id {
        return Err(VaultError::CorruptRecord {
            path: path.to_path_buf(),
            reason: "record owner or id does not match its location".into(),
        });
    }
    Ok(record)
}

fn list_owned<T: OwnedRecord + DeserializeOwned>(dir: &Path, user: &UserId) -> VaultResult<Vec<T>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VaultError::FileRead(e)),
    };

    let mut records = Vec::new();

    for entry in entries {
        let entry = entry.map_err(VaultError::FileRead)?;
        let path = entry.path();

        let Some(stem) = record_stem(&path) else {
            continue;
        };

        let record: Option<T> = read_yaml(&path)?;
        if let Some(record) = record {
            records.push(check_owned(record, user, stem, &path)?);
        }
    }

    sort_records(&mut records);
    Ok(records)
}

/// The id part of `<id>.yaml`; temporary files and anything else are skipped.
fn record_stem(path: &Path) -> Option<&str> {
    if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| ShardableUuid::is_canonical(s))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> VaultResult<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VaultError::FileRead(e)),
    };

    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(VaultError::YamlDeserialization)
}

fn write_yaml_atomic<T: Serialize>(path: &Path, value: &T) -> VaultResult<()> {
    let yaml = serde_yaml::to_string(value).map_err(VaultError::YamlSerialization)?;

    let parent = path.parent().ok_or_else(|| {
        VaultError::InvalidInput(format!("record path {} has no parent", path.display()))
    })?;
    fs::create_dir_all(parent).map_err(VaultError::StorageDirCreation)?;

    let temp_path = parent.join(format!(".{}.tmp", ShardableUuid::new()));
    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(yaml.as_bytes())?;
        file.sync_all()
    });

    if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(VaultError::FileWrite(e));
    }

    Ok(())
}

fn remove_if_exists(path: &Path) -> VaultResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(VaultError::FileDelete(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestVault;
    use chrono::{Duration, Utc};
    use imgvault_types::NonEmptyText;

    fn folder(user: &UserId, name: &str, parent: Option<FolderId>) -> Folder {
        Folder {
            id: FolderId::new(),
            name: NonEmptyText::new(name).unwrap(),
            user_id: user.clone(),
            parent_folder_id: parent,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn folder_round_trip_under_sharded_dir() {
        let vault = TestVault::new();
        let user = UserId::new();
        let f = folder(&user, "Vacation", None);

        vault.store.write_folder(&f).unwrap();

        let expected = user
            .as_uuid()
            .sharded_dir(&vault.cfg.users_dir())
            .join("folders")
            .join(format!("{}.yaml", f.id));
        assert!(expected.is_file());
        assert_eq!(vault.store.read_folder(&user, &f.id).unwrap(), Some(f));
    }

    #[test]
    fn other_users_cannot_see_records() {
        let vault = TestVault::new();
        let owner = UserId::new();
        let stranger = UserId::new();
        let f = folder(&owner, "Private", None);
        vault.store.write_folder(&f).unwrap();

        assert_eq!(vault.store.read_folder(&stranger, &f.id).unwrap(), None);
        assert!(vault.store.list_folders(&stranger).unwrap().is_empty());
    }

    #[test]
    fn list_is_ordered_by_created_at_then_id() {
        let vault = TestVault::new();
        let user = UserId::new();
        let now = Utc::now();

        let mut later = folder(&user, "later", None);
        later.created_at = now + Duration::seconds(10);
        let mut earlier = folder(&user, "earlier", None);
        earlier.created_at = now;

        vault.store.write_folder(&later).unwrap();
        vault.store.write_folder(&earlier).unwrap();

        let names: Vec<String> = vault
            .store
            .list_folders(&user)
            .unwrap()
            .into_iter()
            .map(|f| f.name.into_inner())
            .collect();
        assert_eq!(names, vec!["earlier", "later"]);
    }

    #[test]
    fn list_skips_temp_files_and_leaves_none_behind() {
        let vault = TestVault::new();
        let user = UserId::new();
        vault.store.write_folder(&folder(&user, "a", None)).unwrap();

        let dir = user.as_uuid().sharded_dir(&vault.cfg.users_dir()).join("folders");
        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        fs::write(dir.join(".stray.tmp"), b"garbage").unwrap();
        fs::write(dir.join("notes.txt"), b"garbage").unwrap();
        assert_eq!(vault.store.list_folders(&user).unwrap().len(), 1);
    }

    #[test]
    fn record_moved_to_wrong_owner_is_corrupt() {
        let vault = TestVault::new();
        let owner = UserId::new();
        let other = UserId::new();
        let f = folder(&owner, "a", None);
        vault.store.write_folder(&f).unwrap();

        let src = vault.store.folder_path(&owner, &f.id);
        let dst = vault.store.folder_path(&other, &f.id);
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::copy(&src, &dst).unwrap();

        assert!(matches!(
            vault.store.read_folder(&other, &f.id),
            Err(VaultError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn username_reservation_is_exclusive() {
        let vault = TestVault::new();
        let entry = UsernameEntry {
            user_id: UserId::new(),
            username: "Alice".into(),
        };

        vault.store.reserve_username("alice", &entry).unwrap();
        assert!(matches!(
            vault.store.reserve_username("alice", &entry),
            Err(VaultError::UsernameTaken)
        ));
        assert_eq!(
            vault.store.lookup_username("alice").unwrap(),
            Some(entry.user_id.clone())
        );

        vault.store.release_username("alice").unwrap();
        assert_eq!(vault.store.lookup_username("alice").unwrap(), None);
    }

    #[test]
    fn remove_reports_whether_record_existed() {
        let vault = TestVault::new();
        let user = UserId::new();
        let f = folder(&user, "a", None);
        vault.store.write_folder(&f).unwrap();

        assert!(vault.store.remove_folder(&user, &f.id).unwrap());
        assert!(!vault.store.remove_folder(&user, &f.id).unwrap());
    }

    #[test]
    fn locks_of_different_users_nest() {
        let vault = TestVault::new();
        let a = UserId::new();
        let b = UserId::new();

        let value = vault
            .store
            .with_user_lock(&a, || vault.store.with_user_lock(&b, || Ok(7)))
            .unwrap();
        assert_eq!(value, 7);
    }
}
