use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    StoreError(#[from] resque_store::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("could not find a handler for job class {0}")]
    UnknownClass(String),

    #[error("Job Error: {0}")]
    JobError(anyhow::Error),
}
