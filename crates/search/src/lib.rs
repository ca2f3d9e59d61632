//! # Context Search
//!
//! Deterministic relevance scoring of candidate files.
//!
//! Every factor adds its weight independently; categories can be switched off
//! in [`RelevanceConfig`] without touching the others. Ranking sorts by
//! descending score and then by path, so identical inputs always give the
//! same shortlist.

mod config;
mod error;
mod factor;
mod proximity;
mod scorer;
mod signals;
mod terms;

pub use config::{FactorToggles, RelevanceConfig, RelevanceWeights};
pub use error::{Result, SearchError};
pub use factor::{FactorCategory, RelevanceFactor};
pub use proximity::{directory_proximity, DirectoryProximity};
pub use scorer::{rank, score, RelevanceScore};
pub use signals::RelevanceSignals;
pub use terms::{matching_terms, query_terms};
