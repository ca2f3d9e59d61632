use crate::terms::query_terms;
use context_graph::DependencyProvider;
use context_protocol::paths::normalize_rel_path;
use context_protocol::SymbolRelations;
use std::collections::{BTreeMap, BTreeSet};

/// Everything the scorer knows about the request, gathered before scoring.
#[derive(Debug, Clone, Default)]
pub struct RelevanceSignals {
    pub active_file: Option<String>,
    pub symbols: SymbolRelations,
    /// `file -> files it depends on`.
    pub forward_deps: BTreeMap<String, BTreeSet<String>>,
    /// `file -> files depending on it`.
    pub reverse_deps: BTreeMap<String, BTreeSet<String>>,
    pub query_terms: Vec<String>,
}

impl RelevanceSignals {
    pub fn new(active_file: Option<&str>) -> Self {
        Self {
            active_file: active_file
                .map(normalize_rel_path)
                .filter(|path| !path.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_symbols(mut self, symbols: SymbolRelations) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_dependency_maps(
        mut self,
        forward: BTreeMap<String, BTreeSet<String>>,
        reverse: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        self.forward_deps = forward;
        self.reverse_deps = reverse;
        self
    }

    /// Pulls the active file's edges from `provider`; no-op without an
    /// active file.
    pub fn with_provider(mut self, provider: &dyn DependencyProvider) -> Self {
        let Some(active) = self.active_file.clone() else {
            return self;
        };
        let forward: BTreeSet<String> = provider
            .dependencies(&active)
            .into_iter()
            .map(|edge| edge.path)
            .collect();
        let reverse: BTreeSet<String> = provider
            .dependents(&active)
            .into_iter()
            .map(|edge| edge.path)
            .collect();
        if !forward.is_empty() {
            self.forward_deps.insert(active.clone(), forward);
        }
        if !reverse.is_empty() {
            self.reverse_deps.insert(active, reverse);
        }
        self
    }

    pub fn with_query(mut self, request: &str) -> Self {
        self.query_terms = query_terms(request);
        self
    }

    pub fn is_active(&self, path: &str) -> bool {
        self.active_file.as_deref() == Some(path)
    }

    /// `true` when the active file depends on `path`.
    pub fn is_forward_dependency(&self, path: &str) -> bool {
        self.active_edges(&self.forward_deps)
            .is_some_and(|targets| targets.contains(path))
    }

    /// `true` when `path` depends on the active file.
    pub fn is_reverse_dependency(&self, path: &str) -> bool {
        self.active_edges(&self.reverse_deps)
            .is_some_and(|targets| targets.contains(path))
    }

    fn active_edges<'a>(
        &self,
        map: &'a BTreeMap<String, BTreeSet<String>>,
    ) -> Option<&'a BTreeSet<String>> {
        map.get(self.active_file.as_deref()?)
    }
}
