use async_trait::async_trait;
use redis::AsyncCommands;
use resque_graceful_shutdown::GracefulShutdownConsumer;

use crate::{error::Error, pool::RedisPool};

/// The primitive command surface the core depends on. Kept abstract so the consumer engine
/// never touches `redis`/`deadpool_redis` types directly, and so a fake store can stand in for
/// tests that don't want a live server.
///
/// Every method races the underlying command against `shutdown`'s cancellation signal and
/// returns [`Error::Cancelled`] if that signal fires first. `incr`/`decr` are not retried by any
/// caller in this crate; they are not naturally idempotent.
#[async_trait]
pub trait Store: Send + Sync {
    async fn lpush(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        value: &[u8],
    ) -> Result<(), Error>;

    async fn rpush(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        value: &[u8],
    ) -> Result<(), Error>;

    async fn lpop(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
    ) -> Result<Option<Vec<u8>>, Error>;

    async fn rpop(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
    ) -> Result<Option<Vec<u8>>, Error>;

    async fn get(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
    ) -> Result<Option<String>, Error>;

    async fn set(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        value: &str,
    ) -> Result<(), Error>;

    async fn del(&self, shutdown: &GracefulShutdownConsumer, keys: &[&str]) -> Result<(), Error>;

    async fn incr(&self, shutdown: &GracefulShutdownConsumer, key: &str) -> Result<i64, Error>;

    async fn decr(&self, shutdown: &GracefulShutdownConsumer, key: &str) -> Result<i64, Error>;

    async fn sadd(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        member: &str,
    ) -> Result<(), Error>;

    async fn srem(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        member: &str,
    ) -> Result<(), Error>;
}

/// Runs `fut` to completion unless `shutdown` observes cancellation first.
async fn cancellable<T, Fut>(
    shutdown: &GracefulShutdownConsumer,
    fut: Fut,
) -> Result<T, Error>
where
    Fut: std::future::Future<Output = Result<T, redis::RedisError>>,
{
    let mut shutdown = shutdown.clone();
    tokio::select! {
        biased;

        res = fut => res.map_err(Error::from),
        _ = shutdown.wait_for_shutdown() => Err(Error::Cancelled),
    }
}

#[async_trait]
impl Store for RedisPool {
    async fn lpush(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        value: &[u8],
    ) -> Result<(), Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.lpush(key, value)).await
    }

    async fn rpush(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        value: &[u8],
    ) -> Result<(), Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.rpush(key, value)).await
    }

    async fn lpop(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
    ) -> Result<Option<Vec<u8>>, Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.lpop(key)).await
    }

    async fn rpop(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
    ) -> Result<Option<Vec<u8>>, Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.rpop(key)).await
    }

    async fn get(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
    ) -> Result<Option<String>, Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.get(key)).await
    }

    async fn set(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        value: &str,
    ) -> Result<(), Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.set(key, value)).await
    }

    async fn del(&self, shutdown: &GracefulShutdownConsumer, keys: &[&str]) -> Result<(), Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.del(keys)).await
    }

    async fn incr(&self, shutdown: &GracefulShutdownConsumer, key: &str) -> Result<i64, Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.incr(key, 1)).await
    }

    async fn decr(&self, shutdown: &GracefulShutdownConsumer, key: &str) -> Result<i64, Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.decr(key, 1)).await
    }

    async fn sadd(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        member: &str,
    ) -> Result<(), Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.sadd(key, member)).await
    }

    async fn srem(
        &self,
        shutdown: &GracefulShutdownConsumer,
        key: &str,
        member: &str,
    ) -> Result<(), Error> {
        let mut conn = self.get().await?;
        cancellable(shutdown, conn.srem(key, member)).await
    }
}
