use std::{sync::Arc, time::Duration};

use resque_graceful_shutdown::GracefulShutdownConsumer;
use resque_store::Store;
use tokio::sync::mpsc;
use tracing::{event, Level};

use crate::{
    error::Error,
    identity::WorkerIdentity,
    job::{Envelope, Job},
    worker::{HandlerMap, Worker},
};

/// Multiplexes across a prioritised list of queues, claiming at most one job per tick and
/// handing it to a pool of `N` concurrent workers over an unbuffered channel. See spec §4.2-4.3.
pub struct Poller {
    store: Arc<dyn Store>,
    interval: Duration,
    concurrency: usize,
    namespace: String,
}

impl Poller {
    pub fn new(
        store: Arc<dyn Store>,
        interval: Duration,
        concurrency: usize,
        namespace: impl Into<String>,
    ) -> Self {
        assert!(interval > Duration::from_secs(0), "poll interval must be > 0");
        assert!(concurrency >= 1, "worker count must be >= 1");

        Poller {
            store,
            interval,
            concurrency,
            namespace: namespace.into(),
        }
    }

    /// Starts the poller and `concurrency` workers, and blocks until all workers have exited.
    /// `queues` is priority-ordered (lower index first); `handlers` maps every expected job
    /// class to a [`Handler`](crate::Handler). Returns `Ok(())` on normal shutdown; async
    /// errors are delivered on `errors` instead of through the return value.
    pub async fn start(
        &self,
        ctx: GracefulShutdownConsumer,
        queues: Vec<String>,
        handlers: HandlerMap,
        errors: mpsc::Sender<Error>,
    ) -> Result<(), Error> {
        assert!(!queues.is_empty(), "queues must be non-empty");

        let handlers = Arc::new(handlers);
        let (jobs_tx, jobs_rx) = flume::bounded::<Job>(0);

        let mut worker_tasks = Vec::with_capacity(self.concurrency);
        for slot in 0..self.concurrency {
            let identity = WorkerIdentity::new(slot as u32, queues.clone());
            let worker = Worker::new(
                self.store.clone(),
                self.namespace.clone(),
                identity,
                handlers.clone(),
            );
            let rx = jobs_rx.clone();
            let worker_ctx = ctx.clone();
            let worker_errors = errors.clone();

            worker_tasks.push(tokio::spawn(async move {
                worker.run(worker_ctx, rx, worker_errors).await;
            }));
        }
        // Drop our own receiver handle; the channel closes once the poller's sender drops too
        // and every worker has drained what's left (nothing, once closed, since each tick
        // sends at most one job and only after a worker is ready to receive it).
        drop(jobs_rx);

        self.tick_loop(ctx, &queues, jobs_tx, &errors).await;

        for task in worker_tasks {
            let _ = task.await;
        }

        Ok(())
    }

    async fn tick_loop(
        &self,
        mut ctx: GracefulShutdownConsumer,
        queues: &[String],
        jobs_tx: flume::Sender<Job>,
        errors: &mpsc::Sender<Error>,
    ) {
        loop {
            if ctx.shutting_down() {
                break;
            }

            if let Some(job) = self.claim_one(&ctx, queues, errors).await {
                tokio::select! {
                    biased;

                    _ = ctx.wait_for_shutdown() => break,
                    res = jobs_tx.send_async(job) => {
                        if res.is_err() {
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                biased;

                _ = ctx.wait_for_shutdown() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        // Dropping `jobs_tx` closes the channel; workers drain (nothing left, since a job is
        // only ever in flight between a tick and the one worker that received it) and untrack.
    }

    /// Probes queues left-to-right, LPOPing the first non-empty one. Never pops from more than
    /// one queue per call, so a perpetually non-empty first queue starves the rest by design.
    async fn claim_one(
        &self,
        ctx: &GracefulShutdownConsumer,
        queues: &[String],
        errors: &mpsc::Sender<Error>,
    ) -> Option<Job> {
        for queue in queues {
            let key = format!("{}:queue:{}", self.namespace, queue);
            match self.store.lpop(ctx, &key).await {
                Ok(Some(bytes)) => {
                    return match Envelope::from_slice(&bytes) {
                        Ok(envelope) => Some(Job {
                            queue: queue.clone(),
                            envelope,
                        }),
                        Err(e) => {
                            event!(Level::ERROR, queue=%queue, error=%e, "Malformed job envelope, dropping");
                            let _ = errors.send(Error::SerdeJsonError(e)).await;
                            None
                        }
                    };
                }
                Ok(None) => continue,
                Err(e) => {
                    event!(Level::ERROR, queue=%queue, error=%e, "Store error while polling");
                    let _ = errors.send(Error::StoreError(e)).await;
                    return None;
                }
            }
        }

        None
    }
}
