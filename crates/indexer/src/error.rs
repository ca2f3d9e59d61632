use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid ignore pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid workspace path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}
