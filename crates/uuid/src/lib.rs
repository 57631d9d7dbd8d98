//! UUID and sharded-path utilities.
//!
//! ImgVault identifies users, folders and images with a *canonical* UUID representation:
//! **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - A small wrapper type ([`ShardableUuid`]) that *guarantees* the canonical format once
//!   constructed.
//! - Shared sharding logic to derive per-user directory locations from an identifier.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for externally supplied identifiers (path parameters, form
//! fields, query strings). Non-canonical values (uppercase, hyphenated, wrong length, non-hex)
//! are rejected.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, data lives under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `imgvault_data/users/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This keeps the fan-out of any single directory small.

mod service;

pub use service::{ShardableUuid, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
