//! Request handlers.
//!
//! Each handler parses and validates the request at the boundary, then runs the core operation
//! through [`run_blocking`]. Malformed ids in paths answer `404`; in bodies, forms and queries
//! they answer `400`.

use crate::auth::AuthUser;
use crate::blocking::run_blocking;
use crate::error::{vault_error, ApiError};
use crate::AppState;
use api_shared::{
    CreateFolderReq, FolderRes, HealthRes, HealthService, ImageRes, LoginReq, LoginRes,
    MessageRes, ParentQuery, PathSegmentRes, SearchQuery, SignupReq, UploadImageForm,
};
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use imgvault_core::{
    parse_optional_folder_id, FilesError, Folder, FolderId, Image, ImageId, NewImage,
    PathSegment, VaultError,
};
use imgvault_files::{sniff_media_type, StorageKey};

/// Query value selecting the root level explicitly.
const ROOT_PARAM: &str = "root";

const NOT_FOUND: ApiError = (StatusCode::NOT_FOUND, "Not found");
const FOLDER_NOT_FOUND: &str = "Folder not found";
const IMAGE_NOT_FOUND: &str = "Image not found";

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
pub(crate) async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupReq,
    responses(
        (status = 201, description = "User created", body = MessageRes),
        (status = 400, description = "Invalid username, password or email"),
        (status = 409, description = "Username already exists"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new user.
///
/// Usernames are 3-64 characters of `[A-Za-z0-9._-]` and unique ignoring case; passwords are
/// 8-1024 characters.
#[axum::debug_handler]
pub(crate) async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupReq>,
) -> Result<(StatusCode, Json<MessageRes>), ApiError> {
    let identity = state.identity.clone();
    run_blocking(state.operation_timeout, "signup", "Not found", move || {
        identity.signup(&req.username, &req.password, &req.email)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageRes {
            message: "User created".into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Bearer token", body = LoginRes),
        (status = 400, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
/// Exchange a username and password for a bearer token.
#[axum::debug_handler]
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<Json<LoginRes>, ApiError> {
    let identity = state.identity.clone();
    let issued = run_blocking(state.operation_timeout, "login", "Not found", move || {
        identity.login(&req.username, &req.password)
    })
    .await?;

    Ok(Json(LoginRes {
        token: issued.token,
        expires_at: issued.expires_at.to_rfc3339(),
    }))
}

#[utoipa::path(
    get,
    path = "/folders",
    params(ParentQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Folders of the caller", body = [FolderRes]),
        (status = 400, description = "Invalid parent_id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    )
)]
/// List the caller's folders.
///
/// Without `parent_id` every folder is returned; with `parent_id=root` (or empty) only
/// root-level folders; with a folder id only its direct children.
#[axum::debug_handler]
pub(crate) async fn list_folders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ParentQuery>,
) -> Result<Json<Vec<FolderRes>>, ApiError> {
    let filter = match query.parent_id.as_deref() {
        None => None,
        Some(raw) => Some(parse_parent_id(raw)?),
    };

    let hierarchy = state.hierarchy.clone();
    let folders = run_blocking(state.operation_timeout, "list folders", FOLDER_NOT_FOUND, move || {
        match filter {
            None => hierarchy.list_folders(&user),
            Some(parent) => hierarchy.list_child_folders(&user, parent.as_ref()),
        }
    })
    .await?;

    Ok(Json(folders.into_iter().map(folder_res).collect()))
}

#[utoipa::path(
    post,
    path = "/folders",
    request_body = CreateFolderReq,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Folder created", body = FolderRes),
        (status = 400, description = "Invalid name or parent folder"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    )
)]
/// Create a folder at root or under one of the caller's folders.
#[axum::debug_handler]
pub(crate) async fn create_folder(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateFolderReq>,
) -> Result<Json<FolderRes>, ApiError> {
    let parent = parse_optional_folder_id(req.parent_folder_id.as_deref()).map_err(|e| {
        let e = reject_as(e, VaultError::InvalidParent);
        vault_error("create folder", FOLDER_NOT_FOUND, e)
    })?;

    let hierarchy = state.hierarchy.clone();
    let folder = run_blocking(state.operation_timeout, "create folder", FOLDER_NOT_FOUND, move || {
        hierarchy.create_folder(&user, &req.name, parent.as_ref())
    })
    .await?;

    Ok(Json(folder_res(folder)))
}

#[utoipa::path(
    delete,
    path = "/folders/{id}",
    params(("id" = String, Path, description = "Folder id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Folder deleted", body = MessageRes),
        (status = 400, description = "Folder is not empty"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Folder not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Delete an empty folder.
#[axum::debug_handler]
pub(crate) async fn delete_folder(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<MessageRes>, ApiError> {
    let folder_id = FolderId::parse(&id).map_err(|_| unknown_path_id(FOLDER_NOT_FOUND, &id))?;

    let hierarchy = state.hierarchy.clone();
    run_blocking(state.operation_timeout, "delete folder", FOLDER_NOT_FOUND, move || {
        hierarchy.delete_folder(&user, &folder_id)
    })
    .await?;

    Ok(Json(MessageRes {
        message: "Folder deleted".into(),
    }))
}

#[utoipa::path(
    get,
    path = "/folders/{id}/path",
    params(("id" = String, Path, description = "Folder id, or `root`")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Breadcrumb from root to the folder", body = [PathSegmentRes]),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Folder not found"),
        (status = 500, description = "Internal server error (corrupt hierarchy)")
    )
)]
/// Resolve the breadcrumb of a folder, root label first.
#[axum::debug_handler]
pub(crate) async fn folder_path(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Vec<PathSegmentRes>>, ApiError> {
    let folder_id = if id == ROOT_PARAM {
        None
    } else {
        Some(FolderId::parse(&id).map_err(|_| unknown_path_id(FOLDER_NOT_FOUND, &id))?)
    };

    let hierarchy = state.hierarchy.clone();
    let segments = run_blocking(state.operation_timeout, "resolve path", FOLDER_NOT_FOUND, move || {
        hierarchy.resolve_path(&user, folder_id.as_ref())
    })
    .await?;

    Ok(Json(segments.into_iter().map(path_segment_res).collect()))
}

#[utoipa::path(
    post,
    path = "/images",
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Image uploaded", body = ImageRes),
        (status = 400, description = "Invalid name, folder or file"),
        (status = 401, description = "Missing or invalid token"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Upload failed")
    )
)]
/// Upload an image (multipart fields `name`, optional `folder_id`, file `image`).
#[axum::debug_handler]
pub(crate) async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ImageRes>, ApiError> {
    let mut name = String::new();
    let mut folder_raw: Option<String> = None;
    let mut file: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("name") => name = field.text().await.map_err(multipart_error)?,
            Some("folder_id") => folder_raw = Some(field.text().await.map_err(multipart_error)?),
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, content_type, bytes));
            }
            _ => {}
        }
    }

    let Some((filename, content_type, bytes)) = file else {
        tracing::warn!(%user, "upload rejected: no image field");
        return Err((StatusCode::BAD_REQUEST, "No image provided"));
    };

    if bytes.len() > state.max_upload_bytes {
        tracing::warn!(%user, size = bytes.len(), "upload rejected: too large");
        return Err((StatusCode::PAYLOAD_TOO_LARGE, "Upload too large"));
    }

    let folder = parse_optional_folder_id(folder_raw.as_deref()).map_err(|e| {
        let e = reject_as(e, VaultError::InvalidFolder);
        vault_error("upload image", IMAGE_NOT_FOUND, e)
    })?;

    let images = state.images.clone();
    let image = run_blocking(state.operation_timeout, "upload image", IMAGE_NOT_FOUND, move || {
        images.upload_image(
            &user,
            NewImage {
                name: &name,
                folder_id: folder.as_ref(),
                original_filename: &filename,
                content_type: &content_type,
                content: &bytes,
            },
        )
    })
    .await?;

    Ok(Json(image_res(image)))
}

#[utoipa::path(
    get,
    path = "/images",
    params(ParentQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Images directly inside the folder", body = [ImageRes]),
        (status = 400, description = "Invalid parent_id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    )
)]
/// List the caller's images in one folder; no `parent_id` (or empty, or `root`) lists
/// root-level images.
#[axum::debug_handler]
pub(crate) async fn list_images(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ParentQuery>,
) -> Result<Json<Vec<ImageRes>>, ApiError> {
    let folder = match query.parent_id.as_deref() {
        None => None,
        Some(raw) => parse_parent_id(raw)?,
    };

    let images = state.images.clone();
    let listed = run_blocking(state.operation_timeout, "list images", IMAGE_NOT_FOUND, move || {
        images.list_images(&user, folder.as_ref())
    })
    .await?;

    Ok(Json(listed.into_iter().map(image_res).collect()))
}

#[utoipa::path(
    delete,
    path = "/images/{id}",
    params(("id" = String, Path, description = "Image id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Image deleted", body = MessageRes),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Image not found"),
        (status = 500, description = "Delete failed")
    )
)]
/// Delete an image and its blob.
#[axum::debug_handler]
pub(crate) async fn delete_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<MessageRes>, ApiError> {
    let image_id = ImageId::parse(&id).map_err(|_| unknown_path_id(IMAGE_NOT_FOUND, &id))?;

    let images = state.images.clone();
    run_blocking(state.operation_timeout, "delete image", IMAGE_NOT_FOUND, move || {
        images.delete_image(&user, &image_id)
    })
    .await?;

    Ok(Json(MessageRes {
        message: "Image deleted".into(),
    }))
}

#[utoipa::path(
    get,
    path = "/search",
    params(SearchQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Matching images", body = [ImageRes]),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Internal server error")
    )
)]
/// Search the caller's images by name (literal, case-insensitive substring).
#[axum::debug_handler]
pub(crate) async fn search_images(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ImageRes>>, ApiError> {
    let search = state.search.clone();
    let found = run_blocking(state.operation_timeout, "search images", IMAGE_NOT_FOUND, move || {
        search.search_images(&user, &query.q)
    })
    .await?;

    Ok(Json(found.into_iter().map(image_res).collect()))
}

#[utoipa::path(
    get,
    path = "/blobs/{bucket}/{key}",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Storage key")
    ),
    responses(
        (status = 200, description = "Blob bytes"),
        (status = 404, description = "Blob not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Serve a stored blob. Public, like the object-store URLs it stands in for.
#[axum::debug_handler]
pub(crate) async fn get_blob(
    State(state): State<AppState>,
    AxumPath((bucket, key)): AxumPath<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if bucket != state.files.bucket() {
        tracing::warn!(%bucket, "blob request for unknown bucket");
        return Err(NOT_FOUND);
    }
    let key = StorageKey::parse(key.trim_start_matches('/')).map_err(|e| {
        tracing::warn!("blob request with invalid key: {}", e);
        NOT_FOUND
    })?;

    let files = state.files.clone();
    let content = run_blocking(state.operation_timeout, "read blob", "Not found", move || {
        files.read(&key).map_err(|e| match e {
            FilesError::NotFound(_) => VaultError::NotFound,
            other => VaultError::Blob(other),
        })
    })
    .await?;

    let content_type = sniff_media_type(&content).unwrap_or("application/octet-stream");
    Ok(([(CONTENT_TYPE, content_type)], content))
}

/// Parses a `parent_id` query value: `root` or empty is root, anything else a folder id.
fn parse_parent_id(raw: &str) -> Result<Option<FolderId>, ApiError> {
    let raw = raw.trim();
    if raw == ROOT_PARAM {
        return Ok(None);
    }
    parse_optional_folder_id(Some(raw)).map_err(|e| {
        tracing::warn!("invalid parent_id: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid parent_id")
    })
}

/// 404 for an id in the URL path that cannot name any record.
fn unknown_path_id(message: &'static str, raw: &str) -> ApiError {
    tracing::warn!(id = raw, "malformed id in path");
    (StatusCode::NOT_FOUND, message)
}

/// Replaces an identifier parse failure with the domain error the operation reports for it.
fn reject_as(e: VaultError, replacement: VaultError) -> VaultError {
    match e {
        VaultError::Uuid(_) => replacement,
        other => other,
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::warn!("multipart error: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        (StatusCode::PAYLOAD_TOO_LARGE, "Upload too large")
    } else {
        (StatusCode::BAD_REQUEST, "Invalid multipart body")
    }
}

fn folder_res(folder: Folder) -> FolderRes {
    FolderRes {
        id: folder.id.to_string(),
        name: folder.name.into_inner(),
        user_id: folder.user_id.to_string(),
        parent_folder_id: folder.parent_folder_id.map(|id| id.to_string()),
        created_at: folder.created_at.to_rfc3339(),
    }
}

fn image_res(image: Image) -> ImageRes {
    ImageRes {
        id: image.id.to_string(),
        name: image.name.into_inner(),
        folder_id: image.folder_id.map(|id| id.to_string()),
        user_id: image.user_id.to_string(),
        url: image.url,
        content_type: image.content_type,
        size_bytes: image.size_bytes,
        created_at: image.created_at.to_rfc3339(),
    }
}

fn path_segment_res(segment: PathSegment) -> PathSegmentRes {
    PathSegmentRes {
        id: segment.id.map(|id| id.to_string()),
        name: segment.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn malformed_path_id_is_logged_and_not_found() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let rejected = tracing::subscriber::with_default(subscriber, || {
            unknown_path_id(IMAGE_NOT_FOUND, "not-an-id")
        });

        assert_eq!(rejected, (StatusCode::NOT_FOUND, "Image not found"));
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("malformed id in path"));
        assert!(output.contains("not-an-id"));
    }
}
