use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run an external call on the runtime and wait at most `limit` for it
///
/// The call is spawned so that it keeps running when the caller gives up
/// (timeout or a dropped request); its result is then discarded.
pub(crate) async fn spawn_bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(call);
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(Error::Task {
            operation,
            reason: join_error.to_string(),
        }),
        Err(_) => Err(Error::Timeout {
            operation,
            limit,
        }),
    }
}

/// Like [`spawn_bounded`], retrying exactly once when the first attempt times out
pub(crate) async fn spawn_bounded_with_retry<T, F, Fut>(
    operation: &'static str,
    limit: Duration,
    mut make_call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match spawn_bounded(operation, limit, make_call()).await {
        Err(e) if e.is_transient() => {
            warn!("{}, retrying once", e);
            spawn_bounded(operation, limit, make_call()).await
        }
        other => other,
    }
}
