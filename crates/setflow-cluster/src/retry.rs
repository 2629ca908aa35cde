//! Bounded retry for resource-version conflicts

use crate::error::{ClusterError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Total attempts for an operation that hits a conflict
pub const CONFLICT_ATTEMPTS: u32 = 3;

/// Fixed delay between conflict retries
pub const CONFLICT_BACKOFF: Duration = Duration::from_secs(2);

/// Run `operation`, retrying only on [`ClusterError::Conflict`]
///
/// Any other error is returned immediately. After the last attempt the
/// conflict error itself is returned.
pub async fn retry_on_conflict<T, F, Fut>(what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(ClusterError::Conflict(message)) if attempt < CONFLICT_ATTEMPTS => {
                tracing::warn!(
                    what = %what,
                    attempt,
                    message = %message,
                    "Conflict while updating resource, retrying"
                );
                attempt += 1;
                sleep(CONFLICT_BACKOFF).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_conflicts_then_succeeds() {
        let calls = AtomicU32::new(0);

        let result = retry_on_conflict("apply", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ClusterError::Conflict("the object has been modified".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_bounded_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_on_conflict("apply", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClusterError::Conflict("still modified".into()))
        })
        .await;

        assert!(matches!(result, Err(ClusterError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), CONFLICT_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_on_conflict("apply", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClusterError::NotFound("dc/api".into()))
        })
        .await;

        assert!(matches!(result, Err(ClusterError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
