//! Workspace-relative path helpers.
//!
//! All paths crossing crate boundaries are forward-slash separated and relative
//! to the workspace root, so these helpers never touch the filesystem.

use std::collections::HashMap;
use std::path::Path;

pub fn normalize_rel_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while value.starts_with("./") {
        value = value[2..].to_string();
    }
    while value.contains("//") {
        value = value.replace("//", "/");
    }
    let value = value.trim_matches('/');
    if value == "." {
        return String::new();
    }
    value.to_string()
}

/// Workspace-relative form of `absolute`, or `None` when it lies outside `root`.
pub fn relative_to(root: &Path, absolute: &Path) -> Option<String> {
    let relative = absolute.strip_prefix(root).ok()?;
    let joined = relative
        .components()
        .filter_map(|component| match component {
            std::path::Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    Some(joined)
}

/// Directory part of a relative path; empty for files at the root.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Lower-cased extension without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let idx = name.rfind('.')?;
    if idx == 0 || idx + 1 == name.len() {
        return None;
    }
    Some(name[idx + 1..].to_ascii_lowercase())
}

pub fn dir_segments(dir: &str) -> Vec<&str> {
    dir.split('/').filter(|s| !s.is_empty()).collect()
}

/// `true` when `path` equals `prefix` or lives underneath it.
pub fn path_prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() || path == prefix {
        return true;
    }
    if !path.starts_with(prefix) {
        return false;
    }
    path.as_bytes().get(prefix.len()) == Some(&b'/')
}

/// Case-insensitive lookup from any spelling of a path to its canonical form.
#[derive(Debug, Default, Clone)]
pub struct PathIndex {
    by_lower: HashMap<String, String>,
}

impl PathIndex {
    pub fn new<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut by_lower = HashMap::new();
        for path in paths {
            // First spelling wins for case-colliding trees.
            by_lower
                .entry(path.to_lowercase())
                .or_insert_with(|| path.to_string());
        }
        Self { by_lower }
    }

    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let normalized = normalize_rel_path(raw);
        self.by_lower
            .get(&normalized.to_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.resolve(raw).is_some()
    }

    pub fn len(&self) -> usize {
        self.by_lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lower.is_empty()
    }
}
