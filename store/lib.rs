mod commands;
mod error;
mod pool;

pub use commands::Store;
pub use error::Error;
pub use pool::RedisPool;
