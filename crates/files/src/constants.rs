/// Key segment used in place of a folder id for root-level uploads.
pub const ROOT_KEY_SEGMENT: &str = "root";

/// Placeholder substituted with the bucket name in public URL bases.
pub const BUCKET_PLACEHOLDER: &str = "{bucket}";

/// Longest sanitised filename kept in a storage key.
pub(crate) const MAX_FILENAME_LEN: usize = 128;

/// Fallback filename when nothing usable survives sanitising.
pub(crate) const FALLBACK_FILENAME: &str = "upload";

/// Longest storage key accepted.
pub(crate) const MAX_KEY_LEN: usize = 1024;
