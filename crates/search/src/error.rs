use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug, PartialEq)]
pub enum SearchError {
    #[error("Weight for {factor} must be finite, got {value}")]
    InvalidWeight { factor: &'static str, value: f64 },

    #[error("max_candidates must be at least 1")]
    EmptyShortlist,
}
