//! Runs synchronous core operations off the async runtime, under a deadline.

use crate::error::{vault_error, ApiError, INTERNAL, TIMED_OUT};
use imgvault_core::VaultResult;
use std::time::Duration;

/// Runs `f` on the blocking pool and waits at most `timeout` for it.
///
/// On timeout the caller gets `504` while the operation keeps running to completion; its
/// eventual outcome is logged. Core errors are mapped with [`vault_error`].
pub(crate) async fn run_blocking<T, F>(
    timeout: Duration,
    op: &'static str,
    not_found: &'static str,
    f: F,
) -> Result<T, ApiError>
where
    F: FnOnce() -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::task::spawn_blocking(f);

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result.map_err(|e| vault_error(op, not_found, e)),
        Ok(Err(join_error)) => {
            tracing::error!("{} task failed: {}", op, join_error);
            Err(INTERNAL)
        }
        Err(_) => {
            tracing::warn!("{} timed out after {:?}; letting it finish", op, timeout);
            tokio::spawn(async move {
                match handle.await {
                    Ok(Ok(_)) => tracing::info!("{} completed after timeout", op),
                    Ok(Err(e)) => tracing::warn!("{} failed after timeout: {}", op, e),
                    Err(join_error) => {
                        tracing::error!("{} task failed after timeout: {}", op, join_error)
                    }
                }
            });
            Err(TIMED_OUT)
        }
    }
}
