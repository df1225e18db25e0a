use std::{any::Any, collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use resque_graceful_shutdown::GracefulShutdownConsumer;
use resque_store::Store;
use tokio::sync::mpsc;
use tracing::{event, Level};

use crate::{
    error::Error,
    failed::{self, FailedRecord},
    handler::{Handler, JobResult},
    identity::WorkerIdentity,
    job::Job,
    tracker::Tracker,
};

pub type HandlerMap = HashMap<String, Arc<dyn Handler>>;

/// One worker slot. Owns its tracker identity; everything else (the handler map, the store) is
/// shared, read-only state.
pub(crate) struct Worker {
    store: Arc<dyn Store>,
    namespace: String,
    identity: WorkerIdentity,
    handlers: Arc<HandlerMap>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn Store>,
        namespace: String,
        identity: WorkerIdentity,
        handlers: Arc<HandlerMap>,
    ) -> Self {
        Worker {
            store,
            namespace,
            identity,
            handlers,
        }
    }

    /// Runs until `jobs` is closed (the poller observed cancellation), then untracks and
    /// returns. `untrack` runs on every exit path, including a `track` failure — in that case
    /// there is nothing to untrack yet, so the worker just reports and exits immediately.
    pub async fn run(
        self,
        ctx: GracefulShutdownConsumer,
        jobs: flume::Receiver<Job>,
        errors: mpsc::Sender<Error>,
    ) {
        let tracker = Tracker::new(self.store.clone(), self.namespace.clone(), self.identity.clone());

        if let Err(e) = tracker.track(&ctx).await {
            let _ = errors.send(e).await;
            return;
        }

        while let Ok(job) = jobs.recv_async().await {
            self.handle_job(&ctx, &tracker, job, &errors).await;
        }

        tracker.untrack(&ctx).await;
    }

    async fn handle_job(
        &self,
        ctx: &GracefulShutdownConsumer,
        tracker: &Tracker,
        job: Job,
        errors: &mpsc::Sender<Error>,
    ) {
        let Job { queue, envelope } = job;
        let class = envelope.class.as_str();
        let args = envelope.args.as_slice();

        let handler = self.handlers.get(class).cloned();

        let (result, error) = match handler {
            None => (
                JobResult::none(),
                Some(anyhow::Error::from(Error::UnknownClass(class.to_string()))),
            ),
            Some(handler) => self.run_handler(ctx, &queue, class, args, handler.as_ref()).await,
        };

        let outcome = match error {
            None => tracker.success(ctx).await,
            Some(err) => self.record_failure(ctx, tracker, &queue, args, &err).await,
        };

        if let Err(e) = outcome {
            let _ = errors.send(e).await;
        }
    }

    async fn run_handler(
        &self,
        ctx: &GracefulShutdownConsumer,
        queue: &str,
        class: &str,
        args: &[serde_json::Value],
        handler: &dyn Handler,
    ) -> (JobResult, Option<anyhow::Error>) {
        let mut result = JobResult::none();
        let mut error: Option<anyhow::Error> = None;

        for plugin in handler.plugins() {
            if let Err(e) = plugin.before_perform(ctx, queue, class, args).await {
                error = Some(e);
                break;
            }
        }

        if error.is_none() {
            match catch_panics(handler.perform(ctx, queue, class, args)).await {
                Ok(Ok(r)) => result = r,
                Ok(Err(e)) => error = Some(e),
                Err(panic_msg) => error = Some(anyhow::anyhow!("panic: {}", panic_msg)),
            }
        }

        // Runs unconditionally: for a before-plugin veto, for a handler error, and for success.
        for plugin in handler.plugins() {
            if let Err(e) = plugin
                .after_perform(ctx, queue, class, args, &result, error.as_ref())
                .await
            {
                error = Some(e);
            }
        }

        (result, error)
    }

    async fn record_failure(
        &self,
        ctx: &GracefulShutdownConsumer,
        tracker: &Tracker,
        queue: &str,
        args: &[serde_json::Value],
        error: &anyhow::Error,
    ) -> Result<(), Error> {
        let payload = failed::first_arg(args);
        let record = FailedRecord::new(payload, error.to_string(), tracker.identity_string(), queue);
        let bytes = serde_json::to_vec(&record)?;

        event!(Level::WARN, queue=%queue, error=%error, "Job failed");

        self.store
            .rpush(ctx, &format!("{}:failed", self.namespace), &bytes)
            .await?;
        tracker.fail(ctx).await
    }
}

/// Catches a panic inside `perform` and turns it into an error instead of unwinding past the
/// worker loop — one misbehaving handler must not take down the whole consumer process.
async fn catch_panics<F, T>(fut: F) -> Result<anyhow::Result<T>, String>
where
    F: std::future::Future<Output = anyhow::Result<T>>,
{
    AssertUnwindSafe(fut).catch_unwind().await.map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
