//! Mapping of core errors onto HTTP responses.
//!
//! Handlers return `(StatusCode, &'static str)` on failure; bodies are short plain text.

use axum::http::StatusCode;
use imgvault_core::VaultError;

pub(crate) type ApiError = (StatusCode, &'static str);

pub(crate) const AUTH_REQUIRED: ApiError =
    (StatusCode::UNAUTHORIZED, "Access denied: No token provided");
pub(crate) const INVALID_TOKEN: ApiError = (StatusCode::UNAUTHORIZED, "Invalid token");
pub(crate) const TIMED_OUT: ApiError = (StatusCode::GATEWAY_TIMEOUT, "Operation timed out");
pub(crate) const INTERNAL: ApiError = (StatusCode::INTERNAL_SERVER_ERROR, "Internal error");

/// Maps a core error to a response and logs it: `warn` for client errors, `error` otherwise.
///
/// `not_found` is the body used for `VaultError::NotFound`, so each resource can name itself.
pub(crate) fn vault_error(op: &'static str, not_found: &'static str, e: VaultError) -> ApiError {
    let response = match &e {
        VaultError::InvalidInput(_) | VaultError::Text(_) => {
            (StatusCode::BAD_REQUEST, "Invalid input")
        }
        VaultError::Uuid(_) => (StatusCode::BAD_REQUEST, "Invalid identifier"),
        VaultError::InvalidCredentials => (StatusCode::BAD_REQUEST, "Invalid credentials"),
        VaultError::InvalidToken => INVALID_TOKEN,
        VaultError::UsernameTaken => (StatusCode::CONFLICT, "Username already exists"),
        VaultError::InvalidParent => (StatusCode::BAD_REQUEST, "Invalid parent folder"),
        VaultError::InvalidFolder => (StatusCode::BAD_REQUEST, "Invalid folder"),
        VaultError::NotFound => (StatusCode::NOT_FOUND, not_found),
        VaultError::NotEmpty => (StatusCode::BAD_REQUEST, "Cannot delete folder with contents"),
        VaultError::UploadFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Upload failed"),
        VaultError::DeleteFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Delete failed"),
        VaultError::CorruptHierarchy(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Corrupt folder hierarchy")
        }
        _ => INTERNAL,
    };

    if response.0.is_server_error() {
        tracing::error!("{} error: {:?}", op, e);
    } else {
        tracing::warn!("{} rejected: {}", op, e);
    }

    response
}
