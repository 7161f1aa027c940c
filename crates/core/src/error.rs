use crate::concurrency::SingletonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderScopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
    #[error("Singleton error: {0}")]
    Singleton(#[from] SingletonError),
}

pub type Result<T> = std::result::Result<T, LoaderScopeError>;
