//! Typed record identifiers.
//!
//! Each id wraps a [`ShardableUuid`], so ids of different record kinds cannot be mixed up and
//! every id is known to be canonical (32 lowercase hex characters).

use crate::VaultResult;
use imgvault_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ShardableUuid);

        impl $name {
            pub fn new() -> Self {
                Self(ShardableUuid::new())
            }

            /// Parses a canonical identifier.
            ///
            /// # Errors
            ///
            /// Returns `VaultError::Uuid` for anything other than 32 lowercase hex characters.
            pub fn parse(input: &str) -> VaultResult<Self> {
                Ok(Self(ShardableUuid::parse(input)?))
            }

            pub fn as_uuid(&self) -> &ShardableUuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = crate::VaultError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

record_id!(
    /// Identifies a user.
    UserId
);
record_id!(
    /// Identifies a folder.
    FolderId
);
record_id!(
    /// Identifies an image.
    ImageId
);

/// Parses an optional folder reference from query or form input.
///
/// Absent and blank values mean root (`None`); anything else must be a canonical id.
pub fn parse_optional_folder_id(raw: Option<&str>) -> VaultResult<Option<FolderId>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => FolderId::parse(value).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VaultError;

    #[test]
    fn ids_round_trip_through_display() {
        let id = FolderId::new();
        let parsed: FolderId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn ids_reject_hyphenated_form() {
        assert!(matches!(
            ImageId::parse("550e8400-e29b-41d4-a716-446655440000"),
            Err(VaultError::Uuid(_))
        ));
    }

    #[test]
    fn ids_serialise_as_plain_strings() {
        let id = UserId::parse("550e8400e29b41d4a716446655440000").unwrap();
        assert_eq!(
            serde_yaml::to_string(&id).unwrap().trim(),
            "550e8400e29b41d4a716446655440000"
        );
    }

    #[test]
    fn optional_folder_blank_means_root() {
        assert_eq!(parse_optional_folder_id(None).unwrap(), None);
        assert_eq!(parse_optional_folder_id(Some("  ")).unwrap(), None);
        assert!(parse_optional_folder_id(Some("nope")).is_err());

        let id = FolderId::new();
        assert_eq!(
            parse_optional_folder_id(Some(&id.to_string())).unwrap(),
            Some(id)
        );
    }
}
