//! Timeout enforcement.
//!
//! # Responsibilities
//! - Put a deadline on every provider and cache call
//! - Turn an elapsed deadline into the caller's own error type
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - The wrapped future is dropped (cancelled) when the deadline passes

use std::future::Future;
use std::time::Duration;

use tokio::time;

/// Run `fut` with a deadline, mapping an elapsed deadline through `on_timeout`.
pub async fn bounded<T, E, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ProviderError;

    #[tokio::test]
    async fn test_passes_through_result() {
        let ok: Result<u8, ProviderError> =
            bounded(Duration::from_secs(1), async { Ok(7) }, ProviderError::Timeout).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u8, ProviderError> = bounded(
            Duration::from_secs(1),
            async { Err(ProviderError::InvalidResponse("bad".into())) },
            ProviderError::Timeout,
        )
        .await;
        assert!(matches!(err, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_deadline_elapses() {
        let slow = async {
            time::sleep(Duration::from_secs(60)).await;
            Ok::<u8, ProviderError>(1)
        };
        let result = bounded(Duration::from_millis(50), slow, ProviderError::Timeout).await;
        assert!(matches!(result, Err(ProviderError::Timeout(d)) if d == Duration::from_millis(50)));
    }
}
