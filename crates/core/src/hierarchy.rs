//! Folder tree operations.
//!
//! Invariants held by this module:
//! - a folder's parent, if any, is a folder of the same user;
//! - the parent graph is acyclic (new folders can only point at existing ones and parents are
//!   never changed, so a cycle can only come from hand-edited records);
//! - a folder is deleted only when it has no child folders and no images.

use crate::config::CoreConfig;
use crate::ids::{FolderId, UserId};
use crate::models::{Folder, PathSegment};
use crate::records::RecordStore;
use crate::validation::validate_folder_name;
use crate::{VaultError, VaultResult};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct HierarchyService {
    cfg: Arc<CoreConfig>,
    store: Arc<RecordStore>,
}

/// Outcome of [`HierarchyService::verify_hierarchy`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    pub folders_checked: usize,
    /// Folders whose ancestry cannot be resolved, with the reason.
    pub corrupt: Vec<(FolderId, String)>,
}

impl HierarchyReport {
    pub fn is_healthy(&self) -> bool {
        self.corrupt.is_empty()
    }
}

impl HierarchyService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<RecordStore>) -> Self {
        Self { cfg, store }
    }

    /// All folders owned by `user`, ordered by creation time then id.
    pub fn list_folders(&self, user: &UserId) -> VaultResult<Vec<Folder>> {
        self.store.list_folders(user)
    }

    /// Direct children of `parent`, or root-level folders when `parent` is `None`.
    pub fn list_child_folders(
        &self,
        user: &UserId,
        parent: Option<&FolderId>,
    ) -> VaultResult<Vec<Folder>> {
        let mut folders = self.store.list_folders(user)?;
        folders.retain(|f| f.parent_folder_id.as_ref() == parent);
        Ok(folders)
    }

    /// Creates a folder under `parent` (or at root).
    ///
    /// # Errors
    ///
    /// - `VaultError::InvalidInput` for an unusable name.
    /// - `VaultError::InvalidParent` if `parent` is not a folder owned by `user`.
    pub fn create_folder(
        &self,
        user: &UserId,
        name: &str,
        parent: Option<&FolderId>,
    ) -> VaultResult<Folder> {
        let name = validate_folder_name(name)?;

        self.store.with_user_lock(user, || {
            if let Some(parent_id) = parent {
                if self.store.read_folder(user, parent_id)?.is_none() {
                    tracing::warn!(
                        %user,
                        parent = %parent_id,
                        "create folder rejected: unknown parent"
                    );
                    return Err(VaultError::InvalidParent);
                }
            }

            let folder = Folder {
                id: FolderId::new(),
                name,
                user_id: user.clone(),
                parent_folder_id: parent.cloned(),
                created_at: Utc::now(),
            };
            self.store.write_folder(&folder)?;

            tracing::info!(%user, folder = %folder.id, "folder created");
            Ok(folder)
        })
    }

    /// Deletes an empty folder.
    ///
    /// # Errors
    ///
    /// - `VaultError::NotFound` if `user` has no such folder.
    /// - `VaultError::NotEmpty` if any folder or image sits directly inside it.
    pub fn delete_folder(&self, user: &UserId, folder_id: &FolderId) -> VaultResult<()> {
        self.store.with_user_lock(user, || {
            if self.store.read_folder(user, folder_id)?.is_none() {
                return Err(VaultError::NotFound);
            }

            let has_child_folder = self
                .store
                .list_folders(user)?
                .iter()
                .any(|f| f.parent_folder_id.as_ref() == Some(folder_id));
            let has_image = self
                .store
                .list_images(user)?
                .iter()
                .any(|i| i.folder_id.as_ref() == Some(folder_id));

            if has_child_folder || has_image {
                tracing::warn!(%user, folder = %folder_id, "delete folder rejected: not empty");
                return Err(VaultError::NotEmpty);
            }

            self.store.remove_folder(user, folder_id)?;
            tracing::info!(%user, folder = %folder_id, "folder deleted");
            Ok(())
        })
    }

    /// Breadcrumb from root to `folder`, root sentinel first.
    ///
    /// # Errors
    ///
    /// - `VaultError::NotFound` if `user` has no such folder.
    /// - `VaultError::CorruptHierarchy` on a cycle or a parent pointer to a missing folder.
    pub fn resolve_path(
        &self,
        user: &UserId,
        folder: Option<&FolderId>,
    ) -> VaultResult<Vec<PathSegment>> {
        let root = PathSegment {
            id: None,
            name: self.cfg.root_label().to_string(),
        };

        let Some(target) = folder else {
            return Ok(vec![root]);
        };

        let folders: HashMap<FolderId, Folder> = self
            .store
            .list_folders(user)?
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();

        if !folders.contains_key(target) {
            return Err(VaultError::NotFound);
        }

        let mut segments = ancestry(&folders, target)?;
        segments.push(root);
        segments.reverse();
        Ok(segments)
    }

    /// Resolves every folder of `user` and reports the ones whose ancestry is corrupt.
    pub fn verify_hierarchy(&self, user: &UserId) -> VaultResult<HierarchyReport> {
        let folders: HashMap<FolderId, Folder> = self
            .store
            .list_folders(user)?
            .into_iter()
            .map(|f| (f.id.clone(), f))
            .collect();

        let mut report = HierarchyReport {
            folders_checked: folders.len(),
            corrupt: Vec::new(),
        };

        for id in folders.keys() {
            match ancestry(&folders, id) {
                Ok(_) => {}
                Err(VaultError::CorruptHierarchy(reason)) => {
                    report.corrupt.push((id.clone(), reason))
                }
                Err(e) => return Err(e),
            }
        }

        report.corrupt.sort();
        if !report.is_healthy() {
            tracing::warn!(%user, corrupt = report.corrupt.len(), "folder hierarchy is corrupt");
        }
        Ok(report)
    }
}

/// Walks parent pointers from `start` upward, returning segments target-first.
///
/// A folder map of `n` entries can never yield a valid chain longer than `n`, so the walk is
/// bounded even without the visited set.
fn ancestry(
    folders: &HashMap<FolderId, Folder>,
    start: &FolderId,
) -> VaultResult<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(start.clone());

    while let Some(id) = current {
        if !visited.insert(id.clone()) {
            return Err(VaultError::CorruptHierarchy(format!(
                "cycle detected at folder {id}"
            )));
        }
        if segments.len() >= folders.len() {
            return Err(VaultError::CorruptHierarchy(format!(
                "depth bound exceeded at folder {id}"
            )));
        }

        let folder = folders.get(&id).ok_or_else(|| {
            VaultError::CorruptHierarchy(format!("dangling parent pointer to folder {id}"))
        })?;

        segments.push(PathSegment {
            id: Some(folder.id.clone()),
            name: folder.name.to_string(),
        });
        current = folder.parent_folder_id.clone();
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestVault;

    #[test]
    fn create_at_root_and_nested() {
        let vault = TestVault::new();
        let user = UserId::new();

        let vacation = vault.hierarchy.create_folder(&user, " Vacation ", None).unwrap();
        let beach = vault
            .hierarchy
            .create_folder(&user, "Beach", Some(&vacation.id))
            .unwrap();

        assert_eq!(vacation.name.as_str(), "Vacation");
        assert_eq!(vacation.parent_folder_id, None);
        assert_eq!(beach.parent_folder_id, Some(vacation.id.clone()));
        assert_eq!(vault.hierarchy.list_folders(&user).unwrap().len(), 2);
    }

    #[test]
    fn sibling_names_need_not_be_unique() {
        let vault = TestVault::new();
        let user = UserId::new();

        vault.hierarchy.create_folder(&user, "Same", None).unwrap();
        vault.hierarchy.create_folder(&user, "Same", None).unwrap();
        assert_eq!(vault.hierarchy.list_folders(&user).unwrap().len(), 2);
    }

    #[test]
    fn create_with_missing_parent_is_invalid_parent() {
        let vault = TestVault::new();
        let user = UserId::new();

        let err = vault
            .hierarchy
            .create_folder(&user, "Orphan", Some(&FolderId::new()))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidParent));
        assert!(vault.hierarchy.list_folders(&user).unwrap().is_empty());
    }

    #[test]
    fn create_with_foreign_parent_is_invalid_parent() {
        let vault = TestVault::new();
        let owner = UserId::new();
        let intruder = UserId::new();
        let theirs = vault.hierarchy.create_folder(&owner, "Theirs", None).unwrap();

        let err = vault
            .hierarchy
            .create_folder(&intruder, "Mine", Some(&theirs.id))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidParent));
    }

    #[test]
    fn create_rejects_bad_names() {
        let vault = TestVault::new();
        let user = UserId::new();

        for bad in ["", "  ", "a/b"] {
            assert!(matches!(
                vault.hierarchy.create_folder(&user, bad, None),
                Err(VaultError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn list_child_folders_filters_by_parent() {
        let vault = TestVault::new();
        let user = UserId::new();
        let a = vault.hierarchy.create_folder(&user, "A", None).unwrap();
        let b = vault.hierarchy.create_folder(&user, "B", Some(&a.id)).unwrap();
        vault.hierarchy.create_folder(&user, "C", None).unwrap();

        let roots = vault.hierarchy.list_child_folders(&user, None).unwrap();
        assert_eq!(roots.len(), 2);
        assert!(roots.iter().all(|f| f.parent_folder_id.is_none()));

        let children = vault.hierarchy.list_child_folders(&user, Some(&a.id)).unwrap();
        assert_eq!(children, vec![b]);
    }

    #[test]
    fn delete_empty_folder_removes_it() {
        let vault = TestVault::new();
        let user = UserId::new();
        let folder = vault.hierarchy.create_folder(&user, "Empty", None).unwrap();

        vault.hierarchy.delete_folder(&user, &folder.id).unwrap();
        assert!(vault.hierarchy.list_folders(&user).unwrap().is_empty());
    }

    #[test]
    fn delete_folder_with_child_is_not_empty() {
        let vault = TestVault::new();
        let user = UserId::new();
        let parent = vault.hierarchy.create_folder(&user, "Parent", None).unwrap();
        vault
            .hierarchy
            .create_folder(&user, "Child", Some(&parent.id))
            .unwrap();

        assert!(matches!(
            vault.hierarchy.delete_folder(&user, &parent.id),
            Err(VaultError::NotEmpty)
        ));
        assert!(vault
            .hierarchy
            .list_folders(&user)
            .unwrap()
            .iter()
            .any(|f| f.id == parent.id));
    }

    #[test]
    fn delete_missing_or_foreign_folder_is_not_found() {
        let vault = TestVault::new();
        let owner = UserId::new();
        let other = UserId::new();
        let folder = vault.hierarchy.create_folder(&owner, "Mine", None).unwrap();

        assert!(matches!(
            vault.hierarchy.delete_folder(&owner, &FolderId::new()),
            Err(VaultError::NotFound)
        ));
        assert!(matches!(
            vault.hierarchy.delete_folder(&other, &folder.id),
            Err(VaultError::NotFound)
        ));
        assert_eq!(vault.hierarchy.list_folders(&owner).unwrap().len(), 1);
    }

    #[test]
    fn resolve_path_starts_with_root_sentinel() {
        let vault = TestVault::new();
        let user = UserId::new();
        let a = vault.hierarchy.create_folder(&user, "A", None).unwrap();
        let b = vault.hierarchy.create_folder(&user, "B", Some(&a.id)).unwrap();

        let root_only = vault.hierarchy.resolve_path(&user, None).unwrap();
        assert_eq!(
            root_only,
            vec![PathSegment {
                id: None,
                name: "My Drive".into()
            }]
        );

        let path = vault.hierarchy.resolve_path(&user, Some(&b.id)).unwrap();
        let names: Vec<&str> = path.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["My Drive", "A", "B"]);
        assert_eq!(path[0].id, None);
        assert_eq!(path[2].id, Some(b.id));
    }

    #[test]
    fn resolve_path_of_unknown_folder_is_not_found() {
        let vault = TestVault::new();
        let user = UserId::new();

        assert!(matches!(
            vault.hierarchy.resolve_path(&user, Some(&FolderId::new())),
            Err(VaultError::NotFound)
        ));
    }

    #[test]
    fn resolve_path_detects_hand_made_cycle() {
        let vault = TestVault::new();
        let user = UserId::new();
        let a = vault.hierarchy.create_folder(&user, "A", None).unwrap();
        let b = vault.hierarchy.create_folder(&user, "B", Some(&a.id)).unwrap();

        let mut looped = a.clone();
        looped.parent_folder_id = Some(b.id.clone());
        vault.store.write_folder(&looped).unwrap();

        assert!(matches!(
            vault.hierarchy.resolve_path(&user, Some(&b.id)),
            Err(VaultError::CorruptHierarchy(_))
        ));

        let report = vault.hierarchy.verify_hierarchy(&user).unwrap();
        assert_eq!(report.folders_checked, 2);
        assert_eq!(report.corrupt.len(), 2);
        assert!(!report.is_healthy());
    }

    #[test]
    fn resolve_path_detects_dangling_parent() {
        let vault = TestVault::new();
        let user = UserId::new();
        let mut orphan = vault.hierarchy.create_folder(&user, "Orphan", None).unwrap();
        orphan.parent_folder_id = Some(FolderId::new());
        vault.store.write_folder(&orphan).unwrap();

        assert!(matches!(
            vault.hierarchy.resolve_path(&user, Some(&orphan.id)),
            Err(VaultError::CorruptHierarchy(_))
        ));
    }

    #[test]
    fn verify_healthy_tree() {
        let vault = TestVault::new();
        let user = UserId::new();
        let a = vault.hierarchy.create_folder(&user, "A", None).unwrap();
        vault.hierarchy.create_folder(&user, "B", Some(&a.id)).unwrap();

        let report = vault.hierarchy.verify_hierarchy(&user).unwrap();
        assert_eq!(report.folders_checked, 2);
        assert!(report.is_healthy());
    }

    #[test]
    fn concurrent_creates_under_one_parent_all_land() {
        let vault = TestVault::new();
        let user = UserId::new();
        let parent = vault.hierarchy.create_folder(&user, "Parent", None).unwrap();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let hierarchy = &vault.hierarchy;
                let user = &user;
                let parent = &parent.id;
                scope.spawn(move || {
                    hierarchy
                        .create_folder(user, &format!("child-{i}"), Some(parent))
                        .unwrap();
                });
            }
        });

        assert_eq!(
            vault
                .hierarchy
                .list_child_folders(&user, Some(&parent.id))
                .unwrap()
                .len(),
            8
        );
    }
}
