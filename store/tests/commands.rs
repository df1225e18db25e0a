#![cfg(feature = "test_redis")]

use resque_graceful_shutdown::GracefulShutdown;
use resque_store::{RedisPool, Store};

fn test_pool() -> RedisPool {
    dotenv::dotenv().ok();
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    RedisPool::new(Some(url)).expect("creating test redis pool")
}

#[tokio::test]
async fn list_push_and_pop() {
    let pool = test_pool();
    let shutdown = GracefulShutdown::new();
    let consumer = shutdown.consumer();
    let key = format!("resque-store-test:{}", uuid::Uuid::new_v4());

    pool.rpush(&consumer, &key, b"one").await.unwrap();
    pool.rpush(&consumer, &key, b"two").await.unwrap();

    assert_eq!(pool.lpop(&consumer, &key).await.unwrap().unwrap(), b"one");
    assert_eq!(pool.lpop(&consumer, &key).await.unwrap().unwrap(), b"two");
    assert_eq!(pool.lpop(&consumer, &key).await.unwrap(), None);
}

#[tokio::test]
async fn counters_and_sets() {
    let pool = test_pool();
    let shutdown = GracefulShutdown::new();
    let consumer = shutdown.consumer();
    let key = format!("resque-store-test:{}", uuid::Uuid::new_v4());

    assert_eq!(pool.incr(&consumer, &key).await.unwrap(), 1);
    assert_eq!(pool.incr(&consumer, &key).await.unwrap(), 2);
    assert_eq!(pool.decr(&consumer, &key).await.unwrap(), 1);

    let set_key = format!("{}:set", key);
    pool.sadd(&consumer, &set_key, "member-a").await.unwrap();
    pool.srem(&consumer, &set_key, "member-a").await.unwrap();

    pool.del(&consumer, &[key.as_str(), set_key.as_str()])
        .await
        .unwrap();
}
