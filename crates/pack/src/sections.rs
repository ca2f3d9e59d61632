//! Renderers for the non-file sections. Each returns the section body;
//! headers and budgets are applied by the assembler.

use context_protocol::paths::{dir_segments, parent_dir};
use context_protocol::{SymbolDetail, SymbolInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Directories deeper than this are folded into their ancestor.
const MAX_TREE_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    FileTree,
    RecentChanges,
    PathManifest,
    Symbols,
    ActiveSymbol,
    Files,
}

impl SectionKind {
    /// Emission order.
    pub const ORDER: [SectionKind; 6] = [
        SectionKind::FileTree,
        SectionKind::RecentChanges,
        SectionKind::PathManifest,
        SectionKind::Symbols,
        SectionKind::ActiveSymbol,
        SectionKind::Files,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SectionKind::FileTree => "File tree",
            SectionKind::RecentChanges => "Recent changes",
            SectionKind::PathManifest => "Existing paths",
            SectionKind::Symbols => "Symbols",
            SectionKind::ActiveSymbol => "Symbol at cursor",
            SectionKind::Files => "Files",
        }
    }
}

/// One entry of the caller-supplied change log. The timestamp is printed
/// verbatim so output stays reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentChange {
    pub timestamp: String,
    pub path: String,
    pub description: String,
}

pub fn render_file_tree(paths: &[String]) -> String {
    let mut dirs: BTreeMap<Vec<&str>, usize> = BTreeMap::new();
    for path in paths {
        let segments = dir_segments(parent_dir(path));
        let depth = segments.len().min(MAX_TREE_DEPTH);
        for ancestor in 0..depth {
            dirs.entry(segments[..ancestor].to_vec()).or_insert(0);
        }
        *dirs.entry(segments[..depth].to_vec()).or_insert(0) += 1;
    }

    let mut out = String::new();
    for (segments, files) in &dirs {
        let noun = if *files == 1 { "file" } else { "files" };
        match segments.last() {
            None => {
                let _ = writeln!(out, "./ ({files} {noun})");
            }
            Some(name) => {
                let indent = "  ".repeat(segments.len() - 1);
                let _ = writeln!(out, "{indent}{name}/ ({files} {noun})");
            }
        }
    }
    out
}

pub fn render_recent_changes(changes: &[RecentChange]) -> String {
    let mut out = String::new();
    for change in changes {
        let _ = writeln!(
            out,
            "- [{}] {}: {}",
            change.timestamp, change.path, change.description
        );
    }
    out
}

pub fn render_manifest(paths: &[String]) -> String {
    let mut out = String::new();
    for path in paths {
        out.push_str(path);
        out.push('\n');
    }
    out
}

pub fn render_symbols(symbols: &[SymbolInfo]) -> String {
    let mut out = String::new();
    for symbol in symbols {
        let name = match &symbol.container {
            Some(container) => format!("{container}::{}", symbol.name),
            None => symbol.name.clone(),
        };
        let _ = writeln!(
            out,
            "- {} {name} ({}:{})",
            symbol.kind.as_str(),
            symbol.path,
            symbol.line
        );
    }
    out
}

pub fn render_active_symbol(detail: &SymbolDetail) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} at {}:{}",
        detail.kind.as_str(),
        detail.name,
        detail.path,
        detail.line
    );
    if let Some(signature) = detail.signature.as_deref().filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(out, "Signature: {}", signature.trim());
    }
    if let Some(doc) = detail
        .documentation
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    {
        let _ = writeln!(out, "Documentation:\n{}", doc.trim());
    }
    if !detail.references.is_empty() {
        let _ = writeln!(out, "References ({}):", detail.references.len());
        for reference in &detail.references {
            let _ = writeln!(out, "- {}:{}", reference.path, reference.line);
        }
    }
    out
}
