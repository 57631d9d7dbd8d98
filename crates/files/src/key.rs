//! Storage keys: the bucket-relative names blobs are stored under.

use crate::constants::{FALLBACK_FILENAME, MAX_FILENAME_LEN, MAX_KEY_LEN, ROOT_KEY_SEGMENT};
use crate::FilesError;
use imgvault_uuid::ShardableUuid;
use std::fmt;

/// A validated, bucket-relative storage key such as
/// `550e.../root/9f1c...-beach.jpg`.
///
/// Every `/`-separated segment is non-empty, is not `.` or `..`, and contains only
/// `[A-Za-z0-9._-]`, so a key can never escape its bucket when joined onto a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Validates an existing key (for example a locator read back from a record).
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidKey`] if any segment is unsafe.
    pub fn parse(input: &str) -> Result<Self, FilesError> {
        if input.is_empty() || input.len() > MAX_KEY_LEN {
            return Err(FilesError::InvalidKey(format!(
                "key length must be between 1 and {MAX_KEY_LEN} bytes"
            )));
        }

        for segment in input.split('/') {
            let safe_chars = segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));

            if segment.is_empty() || segment == "." || segment == ".." || !safe_chars {
                return Err(FilesError::InvalidKey(format!(
                    "unsafe key segment in '{input}'"
                )));
            }
        }

        Ok(Self(input.to_owned()))
    }

    /// Builds a fresh, collision-free key for an upload:
    /// `<owner>/<folder | root>/<random uuid>-<sanitised filename>`.
    pub fn for_upload(
        owner: &ShardableUuid,
        folder: Option<&ShardableUuid>,
        original_filename: &str,
    ) -> Self {
        let folder_segment = folder
            .map(ToString::to_string)
            .unwrap_or_else(|| ROOT_KEY_SEGMENT.to_owned());

        Self(format!(
            "{}/{}/{}-{}",
            owner,
            folder_segment,
            ShardableUuid::new(),
            sanitise_filename(original_filename)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key's segments, suitable for joining onto a directory path one by one.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reduces a client-supplied filename to a safe single key segment.
///
/// Only the final path component is kept; characters outside `[A-Za-z0-9._-]` become `_`;
/// leading dots are stripped so the result is never hidden or `..`; the result is capped at
/// 128 characters and falls back to `upload` if nothing remains.
pub fn sanitise_filename(original: &str) -> String {
    let last_component = original
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let replaced: String = last_component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = replaced.trim_start_matches('.');
    let capped: String = trimmed.chars().take(MAX_FILENAME_LEN).collect();

    if capped.is_empty() {
        FALLBACK_FILENAME.to_owned()
    } else {
        capped
    }
}
