use crate::graph::DependencyGraph;
use crate::types::DependencyEdge;

/// Source of file-level dependency edges for the relevance scorer.
///
/// Hosts with a language server or build graph can provide their own; the
/// engine falls back to [`DependencyGraph`] built from static imports.
pub trait DependencyProvider: Send + Sync {
    /// Files `path` depends on.
    fn dependencies(&self, path: &str) -> Vec<DependencyEdge>;

    /// Files that depend on `path`.
    fn dependents(&self, path: &str) -> Vec<DependencyEdge>;
}

impl DependencyProvider for DependencyGraph {
    fn dependencies(&self, path: &str) -> Vec<DependencyEdge> {
        self.dependencies_of(path)
    }

    fn dependents(&self, path: &str) -> Vec<DependencyEdge> {
        self.dependents_of(path)
    }
}

/// Provider for hosts without dependency information.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDependencies;

impl DependencyProvider for NoDependencies {
    fn dependencies(&self, _path: &str) -> Vec<DependencyEdge> {
        Vec::new()
    }

    fn dependents(&self, _path: &str) -> Vec<DependencyEdge> {
        Vec::new()
    }
}
