//! # Context Protocol
//!
//! Data model shared by every stage of the context pipeline:
//!
//! ```text
//! Scanner ──> CandidateFile[] ──> Scorer ──> FileSelection[] ──> Selector ──> Assembler
//!                                                                              │
//!                                                        ContextBudget ────────┘
//! ```
//!
//! Nothing in this crate performs I/O; it only defines the values passed between
//! the scanner, the relevance scorer, the agentic selector and the assembler.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

pub mod budget;
pub mod exclusions;
pub mod metrics;
pub mod paths;
pub mod selection;
pub mod status;
pub mod symbols;

pub use budget::{
    char_len, take_chars, truncate_with_marker, truncation_marker, ContextBudget, Truncated,
    TRUNCATION_MARKER_PREFIX,
};
pub use metrics::{elapsed_ms, PerfMetrics};
pub use selection::{merge_selections, FileSelection};
pub use status::{LogStatusSink, NullStatusSink, StatusSink};
pub use symbols::{
    Diagnostic, DiagnosticSeverity, OneOrMany, Position, SymbolDetail, SymbolInfo, SymbolKind,
    SymbolLocation, SymbolRelations,
};

/// Payload returned in place of a prompt when no workspace root is available.
pub const NO_WORKSPACE_PAYLOAD: &str = "No workspace folder is open.";

/// A file discovered by the scanner.
///
/// Identity is the workspace-relative `path`; the other fields ride along.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFile {
    /// Workspace-relative, forward-slash separated.
    pub path: String,
    /// Host-specific handle for the file (absolute path for local workspaces).
    pub absolute_id: PathBuf,
    pub size_bytes: u64,
}

impl CandidateFile {
    pub fn new(path: impl Into<String>, absolute_id: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: paths::normalize_rel_path(&path.into()),
            absolute_id: absolute_id.into(),
            size_bytes,
        }
    }
}

impl PartialEq for CandidateFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for CandidateFile {}

impl Hash for CandidateFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for CandidateFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CandidateFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}
