//! Waiting for a resource to reach a terminal state
//!
//! Both the copy phase and the wait-for-up phase use the same primitive:
//! re-read the resource until its classifier reports `Ready` or `Failed`.

use crate::accessor::{Availability, Classifier, Resource};
use crate::config::WaitStrategy;
use crate::notify::NotifyWaiter;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Re-reads the current state of one resource
pub type Reader<R> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<R>> + Send + Sync>;

/// Terminal snapshot returned by a waiter
#[derive(Debug, Clone)]
pub enum Settled<R> {
    Ready(R),
    Failed(R),
}

impl<R> Settled<R> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Settled::Failed(_))
    }

    pub fn into_inner(self) -> R {
        match self {
            Settled::Ready(r) | Settled::Failed(r) => r,
        }
    }
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("wait cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("read failed: {0}")]
    Read(#[source] anyhow::Error),

    #[error("state notifier stopped without a result")]
    NotifierClosed,
}

/// Waits until a resource settles into a terminal state
#[async_trait]
pub trait StateWaiter<R: Resource>: Send + Sync {
    async fn wait_until_terminal(
        &self,
        ctx: &CancellationToken,
        read: Reader<R>,
        classify: Classifier<R>,
    ) -> Result<Settled<R>, WaitError>;
}

/// Sleep-and-read waiter. The first read happens immediately.
#[derive(Debug, Clone)]
pub struct PollingWaiter {
    interval: Duration,
    timeout: Option<Duration>,
}

impl PollingWaiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<R: Resource> StateWaiter<R> for PollingWaiter {
    async fn wait_until_terminal(
        &self,
        ctx: &CancellationToken,
        read: Reader<R>,
        classify: Classifier<R>,
    ) -> Result<Settled<R>, WaitError> {
        let interval = self.interval;
        let poll = async move {
            let mut polls: u32 = 0;
            loop {
                if polls > 0 {
                    tokio::select! {
                        biased;
                        _ = ctx.cancelled() => return Err(WaitError::Cancelled),
                        _ = sleep(interval) => {}
                    }
                }
                polls += 1;

                let state = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Err(WaitError::Cancelled),
                    r = read() => match r {
                        Ok(state) => state,
                        Err(e) => return Err(WaitError::Read(e)),
                    },
                };

                match classify(&state) {
                    Availability::Ready => return Ok(Settled::Ready(state)),
                    Availability::Failed => return Ok(Settled::Failed(state)),
                    Availability::Pending => {
                        tracing::debug!(
                            id = %state.resource_id(),
                            polls,
                            "Resource still pending"
                        );
                    }
                }
            }
        };

        with_timeout(self.timeout, poll).await
    }
}

/// Apply an optional overall bound to a wait future
pub(crate) async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    fut: F,
) -> Result<T, WaitError>
where
    F: Future<Output = Result<T, WaitError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| WaitError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Build the waiter selected by configuration
pub fn waiter_for<R: Resource>(
    strategy: WaitStrategy,
    interval: Duration,
    timeout: Option<Duration>,
) -> Arc<dyn StateWaiter<R>> {
    match strategy {
        WaitStrategy::Polling => Arc::new(PollingWaiter::new(interval).with_timeout(timeout)),
        WaitStrategy::Notify => Arc::new(NotifyWaiter::new(interval).with_timeout(timeout)),
    }
}
