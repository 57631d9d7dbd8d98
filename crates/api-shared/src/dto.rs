//! Wire types for the REST API.
//!
//! Identifiers are canonical 32-character lowercase hex strings. Timestamps are RFC 3339.
//! A `null` folder reference means the root level.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupReq {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoginRes {
    pub token: String,
    /// RFC 3339 expiry of `token`.
    pub expires_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FolderRes {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub parent_folder_id: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateFolderReq {
    pub name: String,
    /// Parent folder id; omitted, `null` or empty for root.
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImageRes {
    pub id: String,
    pub name: String,
    pub folder_id: Option<String>,
    pub user_id: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: String,
}

/// Multipart body of `POST /images`.
#[derive(Debug, ToSchema)]
pub struct UploadImageForm {
    pub name: String,
    pub folder_id: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PathSegmentRes {
    /// `null` for the root sentinel.
    pub id: Option<String>,
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ParentQuery {
    /// Folder id, or `root` / empty for the root level.
    pub parent_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Literal, case-insensitive name fragment. Empty matches everything.
    #[serde(default)]
    pub q: String,
}
