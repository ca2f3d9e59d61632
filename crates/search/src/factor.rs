use serde::{Deserialize, Serialize};

/// One independently weighted reason a candidate is relevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceFactor {
    ActiveFile,
    Definition,
    TypeDefinition,
    Implementation,
    ReferencedType,
    CallHierarchy,
    ForwardDependency,
    ReverseDependency,
    SameDirectory,
    NeighborDirectory,
    SharedAncestor,
    QueryTerm,
}

impl RelevanceFactor {
    pub const ALL: [RelevanceFactor; 12] = [
        RelevanceFactor::ActiveFile,
        RelevanceFactor::Definition,
        RelevanceFactor::TypeDefinition,
        RelevanceFactor::Implementation,
        RelevanceFactor::ReferencedType,
        RelevanceFactor::CallHierarchy,
        RelevanceFactor::ForwardDependency,
        RelevanceFactor::ReverseDependency,
        RelevanceFactor::SameDirectory,
        RelevanceFactor::NeighborDirectory,
        RelevanceFactor::SharedAncestor,
        RelevanceFactor::QueryTerm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RelevanceFactor::ActiveFile => "active_file",
            RelevanceFactor::Definition => "definition",
            RelevanceFactor::TypeDefinition => "type_definition",
            RelevanceFactor::Implementation => "implementation",
            RelevanceFactor::ReferencedType => "referenced_type",
            RelevanceFactor::CallHierarchy => "call_hierarchy",
            RelevanceFactor::ForwardDependency => "forward_dependency",
            RelevanceFactor::ReverseDependency => "reverse_dependency",
            RelevanceFactor::SameDirectory => "same_directory",
            RelevanceFactor::NeighborDirectory => "neighbor_directory",
            RelevanceFactor::SharedAncestor => "shared_ancestor",
            RelevanceFactor::QueryTerm => "query_term",
        }
    }

    pub fn category(self) -> FactorCategory {
        match self {
            RelevanceFactor::ActiveFile => FactorCategory::ActiveFile,
            RelevanceFactor::Definition
            | RelevanceFactor::TypeDefinition
            | RelevanceFactor::Implementation
            | RelevanceFactor::ReferencedType
            | RelevanceFactor::CallHierarchy => FactorCategory::Symbols,
            RelevanceFactor::ForwardDependency | RelevanceFactor::ReverseDependency => {
                FactorCategory::Dependencies
            }
            RelevanceFactor::SameDirectory
            | RelevanceFactor::NeighborDirectory
            | RelevanceFactor::SharedAncestor => FactorCategory::Proximity,
            RelevanceFactor::QueryTerm => FactorCategory::QueryTerms,
        }
    }
}

impl std::fmt::Display for RelevanceFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toggle granularity for [`RelevanceFactor`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorCategory {
    ActiveFile,
    Symbols,
    Dependencies,
    Proximity,
    QueryTerms,
}
