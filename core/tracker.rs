use std::sync::Arc;

use chrono::Utc;
use resque_graceful_shutdown::GracefulShutdownConsumer;
use resque_store::Store;
use tracing::{event, Level};

use crate::{error::Error, identity::WorkerIdentity};

/// Records worker liveness and per-worker counters in the store, per spec §4.4 and the key
/// layout in §6. Held by the worker that `track`ed it; `untrack` is best-effort (the caller is
/// already exiting and can't usefully retry).
pub struct Tracker {
    store: Arc<dyn Store>,
    namespace: String,
    identity: WorkerIdentity,
}

impl Tracker {
    pub fn new(store: Arc<dyn Store>, namespace: String, identity: WorkerIdentity) -> Self {
        Tracker {
            store,
            namespace,
            identity,
        }
    }

    pub fn identity_string(&self) -> String {
        self.identity.to_string()
    }

    fn workers_key(&self) -> String {
        format!("{}:workers", self.namespace)
    }

    fn processed_key(&self) -> String {
        format!("{}:stat:processed:{}", self.namespace, self.identity)
    }

    fn failed_key(&self) -> String {
        format!("{}:stat:failed:{}", self.namespace, self.identity)
    }

    fn started_key(&self) -> String {
        format!("{}:worker:{}:started", self.namespace, self.identity)
    }

    /// Cleanup-only key that no variant of this system ever SETs, but that Resque's original
    /// tracker DELs anyway on untrack. A DEL on a key that was never written is a no-op; kept
    /// for bit-compatible cleanup with existing Resque workers in the same namespace.
    fn legacy_worker_key(&self) -> String {
        format!("{}:worker:{}", self.namespace, self.identity)
    }

    pub async fn track(&self, ctx: &GracefulShutdownConsumer) -> Result<(), Error> {
        self.store
            .sadd(ctx, &self.workers_key(), &self.identity.to_string())
            .await?;
        self.store.set(ctx, &self.processed_key(), "0").await?;
        self.store.set(ctx, &self.failed_key(), "0").await?;
        self.store
            .set(ctx, &self.started_key(), &Utc::now().timestamp().to_string())
            .await?;
        Ok(())
    }

    pub async fn untrack(&self, ctx: &GracefulShutdownConsumer) {
        let identity = self.identity.to_string();

        if let Err(e) = self.store.srem(ctx, &self.workers_key(), &identity).await {
            event!(Level::ERROR, error=%e, worker=%identity, "Failed to remove worker from tracked set");
        }

        let keys = [
            self.processed_key(),
            self.failed_key(),
            self.legacy_worker_key(),
            self.started_key(),
        ];
        let key_refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        if let Err(e) = self.store.del(ctx, &key_refs).await {
            event!(Level::ERROR, error=%e, worker=%identity, "Failed to delete worker tracking keys");
        }
    }

    pub async fn success(&self, ctx: &GracefulShutdownConsumer) -> Result<(), Error> {
        self.store
            .incr(ctx, &format!("{}:stat:processed", self.namespace))
            .await?;
        self.store.incr(ctx, &self.processed_key()).await?;
        Ok(())
    }

    pub async fn fail(&self, ctx: &GracefulShutdownConsumer) -> Result<(), Error> {
        self.store
            .incr(ctx, &format!("{}:stat:failed", self.namespace))
            .await?;
        self.store.incr(ctx, &self.failed_key()).await?;
        Ok(())
    }
}
