//! Containment for provider and routine futures.
//!
//! Runs a future with an optional timeout and converts a panic into a value,
//! so the catalog and dispatcher can keep their never-fail contracts.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;

use crate::domain::Result;

/// How a guarded future ended.
#[derive(Debug)]
pub(crate) enum Guarded<T> {
    Completed(Result<T>),
    Panicked(String),
    TimedOut(Duration),
}

/// Await `fut`, containing panics and enforcing `timeout` when set.
pub(crate) async fn run_guarded<T, F>(fut: F, timeout: Option<Duration>) -> Guarded<T>
where
    F: Future<Output = Result<T>>,
{
    let caught = AssertUnwindSafe(fut).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, caught).await {
            Ok(outcome) => outcome,
            Err(_) => return Guarded::TimedOut(limit),
        },
        None => caught.await,
    };
    match outcome {
        Ok(result) => Guarded::Completed(result),
        Err(payload) => Guarded::Panicked(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VigilError;

    #[tokio::test]
    async fn test_completed_passes_through() {
        match run_guarded(async { Ok(7) }, None).await {
            Guarded::Completed(Ok(v)) => assert_eq!(v, 7),
            other => panic!("expected Completed(Ok), got {:?}", other),
        }
        let failed: Guarded<u8> =
            run_guarded(async { Err(VigilError::UnknownModule("x".into())) }, None).await;
        assert!(matches!(failed, Guarded::Completed(Err(_))));
    }

    async fn exploding_probe() -> Result<u8> {
        panic!("probe exploded")
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let guarded = run_guarded(exploding_probe(), None).await;
        match guarded {
            Guarded::Panicked(msg) => assert!(msg.contains("probe exploded")),
            other => panic!("expected Panicked, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires() {
        let guarded: Guarded<u8> = run_guarded(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            },
            Some(Duration::from_millis(100)),
        )
        .await;
        assert!(matches!(guarded, Guarded::TimedOut(d) if d == Duration::from_millis(100)));
    }
}
