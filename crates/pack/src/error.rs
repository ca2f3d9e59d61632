use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackError>;

/// Per-file failures. The assembler renders them as placeholders and keeps
/// going; none of them abort an assembly run.
#[derive(Error, Debug)]
pub enum PackError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: context_indexer::IndexerError,
    },

    #[error("Not a text file: {0}")]
    Binary(String),
}
