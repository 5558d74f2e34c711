//! Retryable provisioning orchestrator
//!
//! One `setup` call runs create → wait-for-copy → provision → wait-for-up
//! on the caller's task. A copy that ends in `Failed` is deleted and the
//! creation retried, up to `retry_count` attempts. Attempts are strictly
//! sequential: a new create is never issued while the previous attempt's
//! resource is unresolved.

use crate::accessor::{Capability, Resource, ResourceId, copy_classifier, up_classifier};
use crate::config::SetupConfig;
use crate::delete::{DeleteError, delete_with_retry};
use crate::error::{Result, SetupError};
use crate::waiter::{Reader, Settled, StateWaiter, WaitError, waiter_for};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type CreateFn<R> = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<R>> + Send + Sync>;
type ReadFn<R> =
    Arc<dyn Fn(String, ResourceId) -> BoxFuture<'static, anyhow::Result<R>> + Send + Sync>;
type DeleteFn =
    Arc<dyn Fn(String, ResourceId) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
type ProvisionFn<R> =
    Arc<dyn Fn(String, ResourceId, R) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Where a setup call currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    Creating,
    WaitingForCopy,
    Deleting,
    Provisioning,
    WaitingForUp,
}

impl std::fmt::Display for SetupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupPhase::Creating => write!(f, "creating"),
            SetupPhase::WaitingForCopy => write!(f, "waiting for copy"),
            SetupPhase::Deleting => write!(f, "deleting"),
            SetupPhase::Provisioning => write!(f, "provisioning"),
            SetupPhase::WaitingForUp => write!(f, "waiting for up"),
        }
    }
}

/// Creates a resource, retrying the whole creation when its background copy fails
pub struct RetryableSetup<R: Resource> {
    create: CreateFn<R>,
    read: ReadFn<R>,
    delete: DeleteFn,
    provision_before_up: Option<ProvisionFn<R>>,
    waiter: Option<Arc<dyn StateWaiter<R>>>,
    config: SetupConfig,
}

impl<R: Resource> RetryableSetup<R> {
    /// Build an orchestrator from the resource's create/read/delete calls.
    ///
    /// Each function receives the zone (and identifier) by value and closes
    /// over whatever client it needs.
    pub fn new<C, CFut, Rd, RFut, D, DFut>(create: C, read: Rd, delete: D) -> Self
    where
        C: Fn(String) -> CFut + Send + Sync + 'static,
        CFut: Future<Output = anyhow::Result<R>> + Send + 'static,
        Rd: Fn(String, ResourceId) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = anyhow::Result<R>> + Send + 'static,
        D: Fn(String, ResourceId) -> DFut + Send + Sync + 'static,
        DFut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            create: Arc::new(move |zone| create(zone).boxed()),
            read: Arc::new(move |zone, id| read(zone, id).boxed()),
            delete: Arc::new(move |zone, id| delete(zone, id).boxed()),
            provision_before_up: None,
            waiter: None,
            config: SetupConfig::default(),
        }
    }

    /// Hook run once after the copy is ready and before waiting for up
    pub fn provision_before_up<P, PFut>(mut self, provision: P) -> Self
    where
        P: Fn(String, ResourceId, R) -> PFut + Send + Sync + 'static,
        PFut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.provision_before_up = Some(Arc::new(move |zone, id, resource| {
            provision(zone, id, resource).boxed()
        }));
        self
    }

    pub fn with_config(mut self, config: SetupConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the configured waiter. Timeouts then belong to `waiter`.
    pub fn with_waiter(mut self, waiter: Arc<dyn StateWaiter<R>>) -> Self {
        self.waiter = Some(waiter);
        self
    }

    /// Run the whole provisioning workflow in `zone`
    pub async fn setup(&self, ctx: &CancellationToken, zone: &str) -> Result<R> {
        let config = self.config.clone().normalized();
        config.validate_for(self.waiter.is_some())?;

        let mut attempt: u32 = 0;
        let created = loop {
            if attempt >= config.retry_count {
                tracing::warn!(
                    zone,
                    retry_count = config.retry_count,
                    "All creation attempts failed"
                );
                return Err(SetupError::MaxRetryCountExceeded {
                    retry_count: config.retry_count,
                });
            }

            if ctx.is_cancelled() {
                return Err(SetupError::Cancelled {
                    phase: SetupPhase::Creating,
                });
            }

            let resource = cancellable(ctx, SetupPhase::Creating, (self.create)(zone.to_string()))
                .await?
                .map_err(SetupError::Create)?;
            let id = resource.resource_id();
            tracing::info!(
                zone,
                %id,
                attempt = attempt + 1,
                retry_count = config.retry_count,
                "Resource created"
            );

            if !config.wait_for_copy {
                break resource;
            }

            // 同期的に作成されるリソースはコピー待ちが存在しない
            if Capability::of(&resource) == Capability::Plain {
                tracing::debug!(%id, "Resource has no availability, skipping copy wait");
                break resource;
            }

            let waiter = self.waiter(&config, config.copy_timeout);
            let settled = waiter
                .wait_until_terminal(ctx, self.reader(zone, &id), copy_classifier())
                .await
                .map_err(|e| match e {
                    WaitError::Cancelled => SetupError::Cancelled {
                        phase: SetupPhase::WaitingForCopy,
                    },
                    source => SetupError::WaitForCopy {
                        id: id.clone(),
                        source,
                    },
                })?;

            match settled {
                Settled::Ready(ready) => break ready,
                Settled::Failed(_) => {
                    tracing::warn!(
                        zone,
                        %id,
                        attempt = attempt + 1,
                        "Copy failed, deleting resource before retrying"
                    );
                    self.cleanup(ctx, zone, &id, &config).await?;
                    attempt += 1;
                }
            }
        };

        let id = created.resource_id();

        if let Some(provision) = &self.provision_before_up {
            self.provision(ctx, zone, &id, &created, provision, &config)
                .await?;
        }

        if !config.wait_for_up {
            tracing::info!(zone, %id, "Setup completed");
            return Ok(created);
        }

        let waiter = self.waiter(&config, config.up_timeout);
        let settled = waiter
            .wait_until_terminal(ctx, self.reader(zone, &id), up_classifier())
            .await
            .map_err(|e| match e {
                WaitError::Cancelled => SetupError::Cancelled {
                    phase: SetupPhase::WaitingForUp,
                },
                source => SetupError::WaitForUp {
                    id: id.clone(),
                    source,
                },
            })?;

        match settled {
            Settled::Ready(up) => {
                tracing::info!(zone, %id, "Setup completed, resource is up");
                Ok(up)
            }
            Settled::Failed(_) => Err(SetupError::FailedToStart { id }),
        }
    }

    fn waiter(
        &self,
        config: &SetupConfig,
        timeout: Option<Duration>,
    ) -> Arc<dyn StateWaiter<R>> {
        match &self.waiter {
            Some(waiter) => waiter.clone(),
            None => waiter_for(
                config.wait_strategy,
                config.polling_interval.unwrap_or_default(),
                timeout,
            ),
        }
    }

    fn reader(&self, zone: &str, id: &ResourceId) -> Reader<R> {
        let read = self.read.clone();
        let zone = zone.to_string();
        let id = id.clone();
        Arc::new(move || read(zone.clone(), id.clone()))
    }

    /// Best-effort removal of a failed attempt.
    ///
    /// Only cancellation is fatal here; an exhausted delete is logged and
    /// the next attempt proceeds, which can leave the resource orphaned.
    async fn cleanup(
        &self,
        ctx: &CancellationToken,
        zone: &str,
        id: &ResourceId,
        config: &SetupConfig,
    ) -> Result<()> {
        let result = delete_with_retry(
            ctx,
            id,
            |id| (self.delete)(zone.to_string(), id),
            config.delete_retry_count,
            config.delete_retry_interval,
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!(zone, %id, "Failed resource deleted");
                Ok(())
            }
            Err(DeleteError::Cancelled) => Err(SetupError::Cancelled {
                phase: SetupPhase::Deleting,
            }),
            Err(e) => {
                tracing::warn!(
                    zone,
                    %id,
                    error = %e,
                    "Giving up on deleting failed resource; it may be left orphaned"
                );
                Ok(())
            }
        }
    }

    async fn provision(
        &self,
        ctx: &CancellationToken,
        zone: &str,
        id: &ResourceId,
        resource: &R,
        provision: &ProvisionFn<R>,
        config: &SetupConfig,
    ) -> Result<()> {
        let mut tries: u32 = 0;
        loop {
            tries += 1;

            if ctx.is_cancelled() {
                return Err(SetupError::Cancelled {
                    phase: SetupPhase::Provisioning,
                });
            }

            let result = cancellable(
                ctx,
                SetupPhase::Provisioning,
                provision(zone.to_string(), id.clone(), resource.clone()),
            )
            .await?;

            let err = match result {
                Ok(()) => {
                    tracing::debug!(zone, %id, tries, "Provisioning finished");
                    return Ok(());
                }
                Err(e) => e,
            };

            if tries >= config.provisioning_retry_count {
                return Err(SetupError::Provision {
                    id: id.clone(),
                    source: err,
                });
            }

            tracing::warn!(
                zone,
                %id,
                tries,
                error = %err,
                "Provisioning failed, retrying in {:?}",
                config.provisioning_retry_interval
            );
            cancellable(
                ctx,
                SetupPhase::Provisioning,
                tokio::time::sleep(config.provisioning_retry_interval),
            )
            .await?;
        }
    }
}

/// Race a blocking call against the caller's cancellation
async fn cancellable<T>(
    ctx: &CancellationToken,
    phase: SetupPhase,
    fut: impl Future<Output = T>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(SetupError::Cancelled { phase }),
        value = fut => Ok(value),
    }
}
