use serde::{Deserialize, Serialize};

/// How one file depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelation {
    /// `import`, `require`, `from x import`.
    Imports,
    /// `export ... from`.
    ReExports,
    /// Rust `mod x;` pulling a child module file.
    DeclaresModule,
}

impl DependencyRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyRelation::Imports => "imports",
            DependencyRelation::ReExports => "re_exports",
            DependencyRelation::DeclaresModule => "declares_module",
        }
    }
}

/// One end of a file-level dependency, seen from the queried file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Workspace-relative path of the other file.
    pub path: String,
    pub relation: DependencyRelation,
}

impl DependencyEdge {
    pub fn new(path: impl Into<String>, relation: DependencyRelation) -> Self {
        Self {
            path: path.into(),
            relation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphBuildStats {
    pub files_read: usize,
    pub files_failed: usize,
    pub edges: usize,
    pub elapsed_ms: u64,
}
