//! # API Shared
//!
//! Shared utilities and definitions for the ImgVault HTTP API.
//!
//! Contains:
//! - Request/response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Bearer token extraction from `Authorization` headers
//!
//! Used by `api-rest` and by clients that want the wire types.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{bearer_token, AuthError};
pub use dto::*;
pub use health::HealthService;
