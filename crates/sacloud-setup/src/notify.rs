//! Push-style waiter
//!
//! A background notifier polls the resource and reports through three
//! channels: completion, progress snapshots and read errors. The waiter
//! selects over them together with the caller's cancellation token.
//! Progress is informational; only completion, error or cancellation end
//! the wait.

use crate::accessor::{Availability, Classifier, Resource};
use crate::waiter::{Reader, Settled, StateWaiter, WaitError, with_timeout};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const PROGRESS_BUFFER: usize = 16;

/// Receiving ends of the notifier
pub(crate) struct Notifications<R> {
    complete: oneshot::Receiver<Settled<R>>,
    progress: mpsc::Receiver<R>,
    error: oneshot::Receiver<anyhow::Error>,
}

/// Waiter backed by a background notifier task
pub struct NotifyWaiter<R> {
    interval: Duration,
    timeout: Option<Duration>,
    last_known: watch::Sender<Option<R>>,
}

impl<R: Resource> NotifyWaiter<R> {
    pub fn new(interval: Duration) -> Self {
        let (last_known, _) = watch::channel(None);
        Self {
            interval,
            timeout: None,
            last_known,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Observe the most recent snapshot seen by the notifier
    pub fn subscribe(&self) -> watch::Receiver<Option<R>> {
        self.last_known.subscribe()
    }
}

#[async_trait]
impl<R: Resource> StateWaiter<R> for NotifyWaiter<R> {
    async fn wait_until_terminal(
        &self,
        ctx: &CancellationToken,
        read: Reader<R>,
        classify: Classifier<R>,
    ) -> Result<Settled<R>, WaitError> {
        // notifier を待機終了時に必ず止める
        let stop = ctx.child_token();
        let _guard = stop.clone().drop_guard();

        let notifications = spawn_notifier(stop, self.interval, read, classify);
        with_timeout(
            self.timeout,
            select_terminal(ctx, notifications, &self.last_known),
        )
        .await
    }
}

/// Start the background notifier. It never touches waiter state; it only sends.
pub(crate) fn spawn_notifier<R: Resource>(
    stop: CancellationToken,
    interval: Duration,
    read: Reader<R>,
    classify: Classifier<R>,
) -> Notifications<R> {
    let (complete_tx, complete) = oneshot::channel();
    let (progress_tx, progress) = mpsc::channel(PROGRESS_BUFFER);
    let (error_tx, error) = oneshot::channel();

    tokio::spawn(async move {
        loop {
            let result = tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                r = read() => r,
            };

            match result {
                Err(e) => {
                    let _ = error_tx.send(e);
                    return;
                }
                Ok(state) => match classify(&state) {
                    Availability::Ready => {
                        let _ = complete_tx.send(Settled::Ready(state));
                        return;
                    }
                    Availability::Failed => {
                        let _ = complete_tx.send(Settled::Failed(state));
                        return;
                    }
                    Availability::Pending => match progress_tx.try_send(state) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            tracing::trace!("Progress buffer full, dropping snapshot");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => return,
                    },
                },
            }

            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                _ = sleep(interval) => {}
            }
        }
    });

    Notifications {
        complete,
        progress,
        error,
    }
}

/// Resolve on the first terminal notification.
///
/// Error and completion are checked before progress, so a queued progress
/// snapshot can never be mistaken for the final state.
pub(crate) async fn select_terminal<R: Resource>(
    ctx: &CancellationToken,
    notifications: Notifications<R>,
    last_known: &watch::Sender<Option<R>>,
) -> Result<Settled<R>, WaitError> {
    let Notifications {
        mut complete,
        mut progress,
        mut error,
    } = notifications;
    let mut complete_open = true;
    let mut error_open = true;
    let mut progress_open = true;

    loop {
        if !complete_open && !error_open {
            return Err(WaitError::NotifierClosed);
        }

        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(WaitError::Cancelled),
            res = &mut error, if error_open => match res {
                Ok(e) => return Err(WaitError::Read(e)),
                Err(_) => error_open = false,
            },
            res = &mut complete, if complete_open => match res {
                Ok(settled) => {
                    last_known.send_replace(Some(settled.clone().into_inner()));
                    return Ok(settled);
                }
                Err(_) => complete_open = false,
            },
            state = progress.recv(), if progress_open => match state {
                Some(state) => {
                    tracing::debug!(id = %state.resource_id(), "Progress snapshot received");
                    last_known.send_replace(Some(state));
                }
                None => progress_open = false,
            },
        }
    }
}
