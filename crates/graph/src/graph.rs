use crate::types::{DependencyEdge, DependencyRelation};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// File-level dependency graph.
///
/// Nodes are workspace-relative paths; an edge `a -> b` means `a` depends on
/// `b`. Parallel edges with the same relation are collapsed.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, DependencyRelation>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S, DependencyRelation)>,
        S: AsRef<str>,
    {
        let mut graph = Self::new();
        for (from, to, relation) in edges {
            graph.add_edge(from.as_ref(), to.as_ref(), relation);
        }
        graph
    }

    pub fn add_file(&mut self, path: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(path) {
            return idx;
        }
        let idx = self.graph.add_node(path.to_string());
        self.nodes.insert(path.to_string(), idx);
        idx
    }

    /// Returns `false` for self references and duplicates.
    pub fn add_edge(&mut self, from: &str, to: &str, relation: DependencyRelation) -> bool {
        if from == to {
            return false;
        }
        let a = self.add_file(from);
        let b = self.add_file(to);
        let exists = self
            .graph
            .edges(a)
            .any(|edge| edge.target() == b && *edge.weight() == relation);
        if exists {
            return false;
        }
        self.graph.add_edge(a, b, relation);
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Files `path` depends on, sorted.
    pub fn dependencies_of(&self, path: &str) -> Vec<DependencyEdge> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Files depending on `path`, sorted.
    pub fn dependents_of(&self, path: &str) -> Vec<DependencyEdge> {
        self.neighbors(path, Direction::Incoming)
    }

    /// `file -> files it depends on`.
    pub fn forward_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.adjacency(Direction::Outgoing)
    }

    /// `file -> files depending on it`.
    pub fn reverse_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.adjacency(Direction::Incoming)
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<DependencyEdge> {
        let Some(&idx) = self.nodes.get(path) else {
            return Vec::new();
        };
        let mut edges: Vec<DependencyEdge> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                DependencyEdge::new(self.graph[other].clone(), *edge.weight())
            })
            .collect();
        edges.sort();
        edges
    }

    fn adjacency(&self, direction: Direction) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for edge in self.graph.edge_references() {
            let (key, value) = match direction {
                Direction::Outgoing => (edge.source(), edge.target()),
                Direction::Incoming => (edge.target(), edge.source()),
            };
            map.entry(self.graph[key].clone())
                .or_default()
                .insert(self.graph[value].clone());
        }
        map
    }
}
