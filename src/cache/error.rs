use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("failed to read cache file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to serialize cache contents")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write cache file '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
