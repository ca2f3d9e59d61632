//! Values produced by the symbol/diagnostics provider.
//!
//! The provider itself lives outside this workspace; these types are the
//! boundary it is normalized to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Zero-indexed editor position, as hosts report cursors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Trait,
    Variable,
    Constant,
    Module,
    Field,
    Other,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Module => "module",
            Self::Field => "field",
            Self::Other => "symbol",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub path: String,
    /// 1-indexed.
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub path: String,
    /// 1-indexed.
    pub line: u32,
    #[serde(default)]
    pub container: Option<String>,
}

/// Everything known about the symbol under the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDetail {
    pub name: String,
    pub kind: SymbolKind,
    pub path: String,
    pub line: u32,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub references: Vec<SymbolLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub line: u32,
    pub severity: DiagnosticSeverity,
    pub message: String,
}

/// Providers answer some queries with one location and others with many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Single(T),
    Multiple(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(value) => vec![value],
            Self::Multiple(values) => values,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Multiple(Vec::new())
    }
}

/// Paths related to the symbol at the cursor, grouped by relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolRelations {
    pub definitions: BTreeSet<String>,
    pub type_definitions: BTreeSet<String>,
    pub implementations: BTreeSet<String>,
    pub referenced_types: BTreeSet<String>,
    pub call_hierarchy: BTreeSet<String>,
}

impl SymbolRelations {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
            && self.type_definitions.is_empty()
            && self.implementations.is_empty()
            && self.referenced_types.is_empty()
            && self.call_hierarchy.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.definitions.contains(path)
            || self.type_definitions.contains(path)
            || self.implementations.contains(path)
            || self.referenced_types.contains(path)
            || self.call_hierarchy.contains(path)
    }

    /// Union of every relation set, sorted.
    pub fn all_paths(&self) -> BTreeSet<String> {
        self.definitions
            .iter()
            .chain(&self.type_definitions)
            .chain(&self.implementations)
            .chain(&self.referenced_types)
            .chain(&self.call_hierarchy)
            .cloned()
            .collect()
    }

    /// Adds provider locations (one or many) to a relation set.
    pub fn extend_from(target: &mut BTreeSet<String>, locations: OneOrMany<SymbolLocation>) {
        target.extend(
            locations
                .into_vec()
                .into_iter()
                .map(|loc| crate::paths::normalize_rel_path(&loc.path))
                .filter(|path| !path.is_empty()),
        );
    }
}
