//! Deleting a resource that may still be mid-transition
//!
//! Deletes issued while a copy is in progress are commonly rejected by the
//! API. The retry interval is constant: the blocking condition clears on a
//! roughly known timescale.

use crate::accessor::ResourceId;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("delete cancelled")]
    Cancelled,

    #[error("delete failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

/// Call `delete` up to `retry_count` times, sleeping `interval` after each failure.
///
/// Returns the last delete error when every attempt fails. A `retry_count`
/// of zero still performs one attempt.
pub async fn delete_with_retry<F, Fut>(
    ctx: &CancellationToken,
    id: &ResourceId,
    delete: F,
    retry_count: u32,
    interval: Duration,
) -> Result<(), DeleteError>
where
    F: Fn(ResourceId) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let attempts = retry_count.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(DeleteError::Cancelled),
            r = delete(id.clone()) => r,
        };

        let err = match result {
            Ok(()) => {
                tracing::debug!(%id, attempt, "Resource deleted");
                return Ok(());
            }
            Err(e) => e,
        };

        if attempt >= attempts {
            return Err(DeleteError::Exhausted {
                attempts: attempt,
                source: err,
            });
        }

        tracing::debug!(
            %id,
            attempt,
            error = %err,
            "Delete rejected, retrying in {:?}",
            interval
        );

        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(DeleteError::Cancelled),
            _ = sleep(interval) => {}
        }
    }
}
