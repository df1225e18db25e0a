use std::sync::Arc;

use async_trait::async_trait;
use resque_graceful_shutdown::GracefulShutdownConsumer;
use resque_store::Store;

use crate::{error::Error, job::Envelope};

/// A before/after hook pair invoked around one enqueue. A `before_enqueue` error stops the chain
/// and aborts before the `RPUSH` happens; `after_enqueue` does not run in that case. Once the
/// write has happened, `after_enqueue` runs for every plugin regardless of earlier errors, and
/// the first error it returns aborts `enqueue`'s return value — but the store writes already
/// landed, so the job is enqueued either way.
#[async_trait]
pub trait EnqueuePlugin: Send + Sync {
    async fn before_enqueue(
        &self,
        _ctx: &GracefulShutdownConsumer,
        _queue: &str,
        _class: &str,
        _args: &[serde_json::Value],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_enqueue(
        &self,
        _ctx: &GracefulShutdownConsumer,
        _queue: &str,
        _class: &str,
        _args: &[serde_json::Value],
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The producer side of the queue: encodes a class/args pair into the Resque envelope format
/// and `RPUSH`es it, registering the queue name in the namespace's queue set along the way.
pub struct Queue {
    store: Arc<dyn Store>,
    namespace: String,
    plugins: Vec<Arc<dyn EnqueuePlugin>>,
}

impl Queue {
    pub fn new(store: Arc<dyn Store>, namespace: impl Into<String>) -> Self {
        Queue {
            store,
            namespace: namespace.into(),
            plugins: Vec::new(),
        }
    }

    pub fn register_plugins(&mut self, plugins: Vec<Arc<dyn EnqueuePlugin>>) {
        self.plugins = plugins;
    }

    /// Runs the before-enqueue chain in registration order, aborting at the first error. On
    /// success, records `queue` in `<ns>:queues`, RPUSHes the encoded envelope onto
    /// `<ns>:queue:<queue>`, then runs the after-enqueue chain; an error there aborts the return
    /// value but not the write, which already landed.
    pub async fn enqueue(
        &self,
        ctx: &GracefulShutdownConsumer,
        queue: &str,
        class: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<(), Error> {
        for plugin in &self.plugins {
            plugin
                .before_enqueue(ctx, queue, class, &args)
                .await
                .map_err(Error::JobError)?;
        }

        let envelope = Envelope::new(class, args);
        let bytes = envelope.to_vec()?;

        self.store
            .sadd(ctx, &format!("{}:queues", self.namespace), queue)
            .await?;
        self.store
            .rpush(ctx, &format!("{}:queue:{}", self.namespace, queue), &bytes)
            .await?;

        for plugin in &self.plugins {
            plugin
                .after_enqueue(ctx, queue, class, &envelope.args)
                .await
                .map_err(Error::JobError)?;
        }

        Ok(())
    }
}
