//! Canonical UUID wrapper and shard path derivation.

use crate::{UuidError, UuidResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// ImgVault's canonical UUID representation (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained UUID is known to be in canonical form, so it is safe to
/// embed in file names, storage keys and URLs without further escaping.
///
/// # Construction
/// - [`ShardableUuid::new`] generates a new random identifier.
/// - [`ShardableUuid::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardableUuid(Uuid);

impl Default for ShardableUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardableUuid {
    /// Generates a new random (v4) UUID in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (hyphenated or uppercase).
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }

        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(e.to_string()))
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical UUID form.
    ///
    /// Purely syntactic: exactly 32 bytes of `0-9` / `a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>/` where `s1`/`s2` are derived from this UUID.
    ///
    /// - `s1` is the first two hex characters of the UUID
    /// - `s2` is the next two hex characters
    /// - The full UUID forms the leaf directory
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for ShardableUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ShardableUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShardableUuid::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ShardableUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ShardableUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ShardableUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_valid_uuid() {
        let uuid = ShardableUuid::new();
        let canonical = uuid.to_string();

        assert_eq!(canonical.len(), 32);
        assert!(ShardableUuid::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_valid_canonical_uuid() {
        let canonical = "550e8400e29b41d4a716446655440000";
        let result = ShardableUuid::parse(canonical);

        assert!(result.is_ok());
        assert_eq!(result.unwrap().to_string(), canonical);
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        let hyphenated = "550e8400-e29b-41d4-a716-446655440000";
        match ShardableUuid::parse(hyphenated) {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_and_bad_lengths() {
        assert!(ShardableUuid::parse("550E8400E29B41D4A716446655440000").is_err());
        assert!(ShardableUuid::parse("550e8400e29b41d4a71644665544000").is_err());
        assert!(ShardableUuid::parse("550e8400e29b41d4a7164466554400000").is_err());
        assert!(ShardableUuid::parse("").is_err());
        assert!(ShardableUuid::parse("root").is_err());
    }

    #[test]
    fn test_parse_rejects_path_traversal() {
        assert!(ShardableUuid::parse("../../../../../../etc/passwd00000").is_err());
    }

    #[test]
    fn test_sharded_dir_layout() {
        let uuid = ShardableUuid::parse("550e8400e29b41d4a716446655440000").unwrap();
        let dir = uuid.sharded_dir(Path::new("/data/users"));

        assert_eq!(
            dir,
            PathBuf::from("/data/users/55/0e/550e8400e29b41d4a716446655440000")
        );
    }

    #[test]
    fn test_from_str_matches_parse() {
        let parsed: ShardableUuid = "abcd123456789012abcd123456789012".parse().unwrap();
        assert_eq!(parsed.to_string(), "abcd123456789012abcd123456789012");
        assert!("nope".parse::<ShardableUuid>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let uuid = ShardableUuid::parse("787b4e1c54cb42fa9e69f84e39da3d9a").unwrap();
        let json = serde_json::to_string(&uuid).unwrap();
        assert_eq!(json, "\"787b4e1c54cb42fa9e69f84e39da3d9a\"");

        let back: ShardableUuid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uuid);

        assert!(serde_json::from_str::<ShardableUuid>("\"787B4E1C\"").is_err());
    }

    #[test]
    fn test_sharded_dir_is_created_on_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let uuid = ShardableUuid::new();
        let dir = uuid.sharded_dir(temp.path());
        std::fs::create_dir_all(&dir).unwrap();

        assert!(dir.is_dir());
        assert!(dir.starts_with(temp.path()));
    }
}
