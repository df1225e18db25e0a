mod error;
mod failed;
mod handler;
mod identity;
mod job;
mod poller;
mod producer;
mod tracker;
mod worker;

pub use error::Error;
pub use handler::{FnHandler, Handler, JobResult, Plugin};
pub use identity::WorkerIdentity;
pub use job::{Envelope, Job};
pub use poller::Poller;
pub use producer::{EnqueuePlugin, Queue};
pub use tracker::Tracker;
pub use worker::HandlerMap;

pub use resque_graceful_shutdown::{GracefulShutdown, GracefulShutdownConsumer};
pub use resque_store::{RedisPool, Store};
