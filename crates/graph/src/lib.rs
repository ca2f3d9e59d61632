//! # Context Graph
//!
//! File-level dependency edges for relevance scoring.
//!
//! ## Architecture
//!
//! ```text
//! CandidateFile[]
//!     │
//!     ├──> DependencyGraph::build (bounded concurrent reads)
//!     │      └─ extract_imports: JS/TS import/require, Python from/import, Rust `mod`
//!     │
//!     ├──> DependencyGraph (petgraph)
//!     │      ├─ Nodes: workspace-relative paths
//!     │      └─ Edges: imports, re-exports, module declarations
//!     │
//!     └──> DependencyProvider
//!            └─ dependencies(path) / dependents(path) for the scorer
//! ```

mod builder;
mod error;
mod graph;
mod imports;
mod provider;
mod types;

pub use builder::GraphBuildOptions;
pub use error::{GraphError, Result};
pub use graph::DependencyGraph;
pub use imports::{extract_imports, supports_imports};
pub use provider::{DependencyProvider, NoDependencies};
pub use types::{DependencyEdge, DependencyRelation, GraphBuildStats};
