use std::{any::Any, fmt, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use resque_graceful_shutdown::GracefulShutdownConsumer;

/// An opaque value threaded from [`Handler::perform`] through to every plugin's
/// [`Plugin::after_perform`]. The core never inspects it; plugins that care about the result
/// downcast it to whatever concrete type their paired handler produces.
pub struct JobResult(Option<Box<dyn Any + Send + Sync>>);

impl JobResult {
    pub fn none() -> Self {
        JobResult(None)
    }

    pub fn some<T: Any + Send + Sync>(value: T) -> Self {
        JobResult(Some(Box::new(value)))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|v| v.downcast_ref())
    }
}

impl fmt::Debug for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "JobResult(<opaque>)"),
            None => write!(f, "JobResult(none)"),
        }
    }
}

/// A before/after hook pair invoked around one handler call. Stateless from the core's
/// perspective: both methods default to a no-op so a plugin can implement just the side it
/// cares about.
#[async_trait]
pub trait Plugin: Send + Sync {
    async fn before_perform(
        &self,
        _ctx: &GracefulShutdownConsumer,
        _queue: &str,
        _class: &str,
        _args: &[serde_json::Value],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_perform(
        &self,
        _ctx: &GracefulShutdownConsumer,
        _queue: &str,
        _class: &str,
        _args: &[serde_json::Value],
        _result: &JobResult,
        _error: Option<&anyhow::Error>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The capability that processes one job and reports success or error, plus the ordered plugin
/// chain that wraps every call to `perform`. Immutable for the lifetime of a `Start` call.
#[async_trait]
pub trait Handler: Send + Sync {
    fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &[]
    }

    async fn perform(
        &self,
        ctx: &GracefulShutdownConsumer,
        queue: &str,
        class: &str,
        args: &[serde_json::Value],
    ) -> anyhow::Result<JobResult>;
}

/// Adapts a bare async function into a [`Handler`] with an empty plugin list, so callers who
/// don't need before/after hooks don't have to write out a trait impl.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: for<'a> Fn(
            &'a GracefulShutdownConsumer,
            &'a str,
            &'a str,
            &'a [serde_json::Value],
        ) -> BoxFuture<'a, anyhow::Result<JobResult>>
        + Send
        + Sync,
{
    pub fn new(f: F) -> Self {
        FnHandler { f }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(
            &'a GracefulShutdownConsumer,
            &'a str,
            &'a str,
            &'a [serde_json::Value],
        ) -> BoxFuture<'a, anyhow::Result<JobResult>>
        + Send
        + Sync,
{
    async fn perform(
        &self,
        ctx: &GracefulShutdownConsumer,
        queue: &str,
        class: &str,
        args: &[serde_json::Value],
    ) -> anyhow::Result<JobResult> {
        (self.f)(ctx, queue, class, args).await
    }
}
