//! The seam between the core and a Penpot backend.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::penpot::error::PenpotResult;
use crate::penpot::model::Id;

/// A Penpot backend: the real HTTP API or the in-memory store.
///
/// Both methods exchange wire values; decoding and encoding stay in
/// [`crate::penpot::codec`].
#[async_trait]
pub trait Platform: Send + Sync {
    /// Reads a file (read path, JSON dialect).
    async fn fetch_file(&self, file_id: &Id) -> PenpotResult<Value>;

    /// Submits an encoded `update-file` request and returns the raw response.
    ///
    /// A stale revision must surface as
    /// [`PenpotError::RevisionConflict`](crate::penpot::error::PenpotError::RevisionConflict).
    async fn update_file(&self, request: Value) -> PenpotResult<Value>;
}

/// Runs `op`; on an unauthenticated signal runs `reauth` and retries `op` once.
///
/// A second unauthenticated response is returned to the caller as is.
///
/// # Errors
///
/// Returns whatever `op` (or `reauth`) fails with.
pub async fn with_reauth<T, Op, OpFut, Re, ReFut>(mut op: Op, reauth: Re) -> PenpotResult<T>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = PenpotResult<T>>,
    Re: FnOnce() -> ReFut,
    ReFut: Future<Output = PenpotResult<()>>,
{
    match op().await {
        Err(e) if e.is_unauthenticated() => {
            warn!("Session rejected ({e}), logging in again and retrying once");
            reauth().await?;
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penpot::error::PenpotError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_exactly_once_after_reauth() {
        let (calls, logins) = (&AtomicUsize::new(0), &AtomicUsize::new(0));
        let result = with_reauth(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(PenpotError::Unauthenticated { status: 401 })
                } else {
                    Ok(42)
                }
            },
            move || async move {
                logins.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_rejection_is_returned() {
        let calls = &AtomicUsize::new(0);
        let result: PenpotResult<()> = with_reauth(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PenpotError::Unauthenticated { status: 403 })
            },
            || async { Ok(()) },
        )
        .await;
        assert!(result.unwrap_err().is_unauthenticated());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let (calls, logins) = (&AtomicUsize::new(0), &AtomicUsize::new(0));
        let result: PenpotResult<()> = with_reauth(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PenpotError::api(500, "boom"))
            },
            move || async move {
                logins.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;
        assert!(matches!(result, Err(PenpotError::Api { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(logins.load(Ordering::SeqCst), 0);
    }
}
