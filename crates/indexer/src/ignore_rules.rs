use crate::error::{IndexerError, Result};
use context_protocol::exclusions::{is_binary_extension, is_excluded_dir};
use context_protocol::paths;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Decides which entries the scanner may recurse into or stat.
///
/// Applied to names and relative paths only, so a rejected entry costs no I/O.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    gitignore: Gitignore,
}

impl IgnoreRules {
    /// Compiles gitignore-style `patterns` (user configured, then the root
    /// `.gitignore` lines) relative to `root`.
    pub fn new(root: &Path, patterns: &[String], gitignore_lines: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns.iter().chain(gitignore_lines) {
            let line = pattern.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            builder
                .add_line(None, line)
                .map_err(|err| IndexerError::InvalidPattern(format!("{line}: {err}")))?;
        }
        let gitignore = builder
            .build()
            .map_err(|err| IndexerError::InvalidPattern(err.to_string()))?;
        Ok(Self { gitignore })
    }

    /// Deny-list only.
    pub fn empty() -> Self {
        Self {
            gitignore: Gitignore::empty(),
        }
    }

    /// `rel_path` is workspace-relative; only its last segment is checked
    /// against the deny-list because parents were checked before recursing.
    pub fn skip_dir(&self, rel_path: &str) -> bool {
        if is_excluded_dir(paths::file_name(rel_path)) {
            return true;
        }
        self.gitignore.matched(rel_path, true).is_ignore()
    }

    pub fn skip_file(&self, rel_path: &str) -> bool {
        if paths::extension(rel_path).is_some_and(|ext| is_binary_extension(&ext)) {
            return true;
        }
        self.gitignore.matched(rel_path, false).is_ignore()
    }
}

/// Parses `.gitignore` content into pattern lines.
pub fn gitignore_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(str::to_string)
        .collect()
}
