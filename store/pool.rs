use std::{env, ops::Deref, sync::Arc};

use crate::error::Error;

/// A cheaply-cloneable handle to a pool of Redis connections.
///
/// This is the only piece of global mutable state the core depends on; everything else
/// (handlers, plugins, the queue list) is read-only for the lifetime of a poll loop.
#[derive(Clone)]
pub struct RedisPool(Arc<RedisPoolInner>);

struct RedisPoolInner {
    pool: deadpool_redis::Pool,
}

impl Deref for RedisPool {
    type Target = deadpool_redis::Pool;

    fn deref(&self) -> &Self::Target {
        &self.0.pool
    }
}

impl RedisPool {
    /// Create a pool from an explicit connection string, falling back to `REDIS_URL`.
    pub fn new(connection: Option<String>) -> Result<RedisPool, Error> {
        let redis_host = connection
            .or_else(|| env::var("REDIS_URL").ok())
            .ok_or_else(|| Error::ConfigError("REDIS_URL is required".to_string()))?;

        let pool = deadpool_redis::Config {
            url: Some(redis_host),
            connection: None,
            pool: None,
        }
        .create_pool()?;

        Ok(RedisPool(Arc::new(RedisPoolInner { pool })))
    }

    pub fn pool(&self) -> &deadpool_redis::Pool {
        &self.0.pool
    }

    pub async fn get(&self) -> Result<deadpool_redis::Connection, Error> {
        self.0.pool.get().await.map_err(Error::from)
    }
}
