//! Input validation utilities.
//!
//! Everything a caller supplies is checked here before it reaches the record store.

use crate::constants::{
    MAX_NAME_CHARS, MAX_PASSWORD_CHARS, MAX_USERNAME_CHARS, MIN_PASSWORD_CHARS,
    MIN_USERNAME_CHARS,
};
use crate::{VaultError, VaultResult};
use imgvault_types::NonEmptyText;

/// Validates a folder name: trimmed, non-empty, at most 255 characters, no control characters
/// and no `/`.
pub fn validate_folder_name(name: &str) -> VaultResult<NonEmptyText> {
    let text = validate_display_name("folder name", name)?;

    if text.as_str().contains('/') {
        return Err(VaultError::InvalidInput(
            "folder name cannot contain '/'".into(),
        ));
    }

    Ok(text)
}

/// Validates an image display name: trimmed, non-empty, at most 255 characters, no control
/// characters.
pub fn validate_image_name(name: &str) -> VaultResult<NonEmptyText> {
    validate_display_name("image name", name)
}

fn validate_display_name(what: &str, name: &str) -> VaultResult<NonEmptyText> {
    let text = NonEmptyText::new(name)
        .map_err(|_| VaultError::InvalidInput(format!("{what} cannot be empty")))?;

    if text.char_count() > MAX_NAME_CHARS {
        return Err(VaultError::InvalidInput(format!(
            "{what} exceeds maximum length of {MAX_NAME_CHARS} characters"
        )));
    }

    if text.as_str().chars().any(char::is_control) {
        return Err(VaultError::InvalidInput(format!(
            "{what} cannot contain control characters"
        )));
    }

    Ok(text)
}

/// Validates a username and returns it unchanged.
///
/// Usernames are 3 to 64 characters of `[A-Za-z0-9._-]`. Case is preserved for display but
/// uniqueness is checked against [`username_key`].
pub fn validate_username(username: &str) -> VaultResult<&str> {
    let len = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&len) {
        return Err(VaultError::InvalidInput(format!(
            "username must be between {MIN_USERNAME_CHARS} and {MAX_USERNAME_CHARS} characters"
        )));
    }

    let ok = username
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(VaultError::InvalidInput(
            "username contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
                .into(),
        ));
    }

    Ok(username)
}

pub fn validate_password(password: &str) -> VaultResult<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&len) {
        return Err(VaultError::InvalidInput(format!(
            "password must be between {MIN_PASSWORD_CHARS} and {MAX_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

/// Case-folded form of a username used for uniqueness and lookup.
pub fn username_key(username: &str) -> String {
    username.to_ascii_lowercase()
}

/// True if `content_type` names an image media type (`image/*`).
pub fn is_image_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}
