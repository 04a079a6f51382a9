//! Transient-failure retry at the transport boundary
//!
//! Only statuses the retryability predicate allows (408, 429, 5xx
//! gateway/availability codes and connection-level failures) are retried;
//! conversion errors and other 4xx are permanent.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::warn;

use crate::error::{Error, Result};

pub(crate) async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(Some(Duration::from_secs(60)))
        .build();

    backoff::future::retry_notify(
        policy,
        || {
            let attempt = op();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_retryable() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |e: Error, delay| warn!(error = %e, ?delay, "retrying after transient failure"),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::from_response(503, "").into())
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let err = with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ApiError::from_response(400, "").into()) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
