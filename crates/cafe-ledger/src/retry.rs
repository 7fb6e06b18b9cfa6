//! # Conflict Retry
//!
//! Re-runs one store operation when SQLite reports it busy or locked.
//!
//! ```text
//!   attempt 1 ──► Conflict ──► sleep(20ms) ──► attempt 2 ──► Conflict
//!       ──► sleep(~40ms) ──► attempt 3 ──► Ok
//! ```
//!
//! Each attempt must be a complete unit (its own transaction) so a retry
//! never replays half of a previous attempt. Non-retryable errors return
//! immediately.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::{LedgerError, LedgerResult};

/// Creates the exponential backoff configuration.
fn create_backoff(settings: &RetrySettings) -> ExponentialBackoff {
    let initial = Duration::from_millis(settings.initial_backoff_ms);
    ExponentialBackoff {
        current_interval: initial,
        initial_interval: initial,
        max_interval: Duration::from_millis(settings.max_backoff_ms),
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Runs `op` until it succeeds, fails for good, or attempts run out.
pub async fn with_retry<T, F, Fut>(
    settings: &RetrySettings,
    operation: &str,
    mut op: F,
) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut backoff = create_backoff(settings);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                if attempt >= settings.max_attempts {
                    return Err(LedgerError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }

                let delay = backoff
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_millis(settings.max_backoff_ms));
                warn!(
                    operation = %operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Store conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafe_db::DbError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetrySettings {
        RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LedgerError::Db(DbError::Conflict("database is locked".into())))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_retry(&fast(), "adjust", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Db(DbError::Conflict("busy".into())))
        })
        .await;

        match result {
            Err(LedgerError::RetriesExhausted { operation, attempts, .. }) => {
                assert_eq!(operation, "adjust");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_invariant_violations() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_retry(&fast(), "post", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::Core(cafe_core::CoreError::EmptyEntry))
        })
        .await;

        assert!(matches!(result, Err(LedgerError::Core(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
