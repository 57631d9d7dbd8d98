//! Name search over a user's images.
//!
//! The query is a literal, matched case-insensitively (Unicode lowercase) as a substring of the
//! image name. An empty query matches every image of the user.

use crate::ids::UserId;
use crate::models::Image;
use crate::records::RecordStore;
use crate::VaultResult;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct SearchService {
    store: Arc<RecordStore>,
}

impl SearchService {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Images of `user`, in any folder, whose name contains `query`.
    pub fn search_images(&self, user: &UserId, query: &str) -> VaultResult<Vec<Image>> {
        let needle = query.to_lowercase();
        let mut images = self.store.list_images(user)?;
        images.retain(|image| name_matches(image.name.as_str(), &needle));

        tracing::debug!(%user, matches = images.len(), "image search");
        Ok(images)
    }
}

fn name_matches(name: &str, lowercase_needle: &str) -> bool {
    lowercase_needle.is_empty() || name.to_lowercase().contains(lowercase_needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::NewImage;
    use crate::test_support::{TestVault, PNG_BYTES};

    fn upload(vault: &TestVault, user: &UserId, name: &str) -> Image {
        vault
            .images
            .upload_image(
                user,
                NewImage {
                    name,
                    folder_id: None,
                    original_filename: "x.png",
                    content_type: "image/png",
                    content: PNG_BYTES,
                },
            )
            .unwrap()
    }

    fn names(images: Vec<Image>) -> Vec<String> {
        images.into_iter().map(|i| i.name.into_inner()).collect()
    }

    #[test]
    fn matches_case_insensitive_substring() {
        let vault = TestVault::new();
        let user = UserId::new();
        upload(&vault, &user, "Cat.png");
        upload(&vault, &user, "caterpillar");
        upload(&vault, &user, "Dog.png");

        assert_eq!(
            names(vault.search.search_images(&user, "cat").unwrap()),
            vec!["Cat.png", "caterpillar"]
        );
    }

    #[test]
    fn scoped_to_user_and_spans_folders() {
        let vault = TestVault::new();
        let user = UserId::new();
        let other = UserId::new();
        let folder = vault.hierarchy.create_folder(&user, "Pets", None).unwrap();

        vault
            .images
            .upload_image(
                &user,
                NewImage {
                    name: "cat in folder",
                    folder_id: Some(&folder.id),
                    original_filename: "c.png",
                    content_type: "image/png",
                    content: PNG_BYTES,
                },
            )
            .unwrap();
        upload(&vault, &other, "other cat");

        assert_eq!(
            names(vault.search.search_images(&user, "CAT").unwrap()),
            vec!["cat in folder"]
        );
    }

    #[test]
    fn query_is_literal_not_a_pattern() {
        let vault = TestVault::new();
        let user = UserId::new();
        upload(&vault, &user, "a+b (1).png");
        upload(&vault, &user, "aab.png");

        assert_eq!(
            names(vault.search.search_images(&user, "a+b (").unwrap()),
            vec!["a+b (1).png"]
        );
        assert!(vault.search.search_images(&user, "[").unwrap().is_empty());
    }

    #[test]
    fn empty_query_returns_everything() {
        let vault = TestVault::new();
        let user = UserId::new();
        upload(&vault, &user, "one");
        upload(&vault, &user, "two");

        assert_eq!(vault.search.search_images(&user, "").unwrap().len(), 2);
    }

    #[test]
    fn unicode_case_folding() {
        assert!(name_matches("ÉTÉ à la plage", "été"));
        assert!(!name_matches("summer", "été"));
    }
}
