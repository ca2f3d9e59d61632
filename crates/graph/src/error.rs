use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph build error: {0}")]
    BuildError(String),

    #[error("Graph build cancelled")]
    Cancelled,

    #[error(transparent)]
    Indexer(#[from] context_indexer::IndexerError),
}
