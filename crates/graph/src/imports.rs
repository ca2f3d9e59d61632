//! Static import extraction for the languages the graph understands.
//!
//! Only specifiers that resolve to a known workspace file produce edges; bare
//! package imports (`react`, `os`, `serde`) are dropped.

use crate::types::{DependencyEdge, DependencyRelation};
use context_protocol::paths::{self, PathIndex};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static JS_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(import|export)\b[^'"`;]*?\bfrom\s*['"]([^'"]+)['"]"#)
        .expect("valid js from regex")
});
static JS_SIDE_EFFECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#).expect("valid js import regex")
});
static JS_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:require|import)\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("valid js require regex")
});
static PY_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*from\s+(\.*)([A-Za-z_][\w\.]*)?\s+import\s+([^\n#]+)")
        .expect("valid python from regex")
});
static PY_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s+([A-Za-z_][\w\.]*(?:\s+as\s+\w+)?(?:\s*,\s*[A-Za-z_][\w\.]*(?:\s+as\s+\w+)?)*)")
        .expect("valid python import regex")
});
static RUST_MOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)\s*;")
        .expect("valid rust mod regex")
});

const JS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportLanguage {
    Script,
    Python,
    Rust,
}

fn language_of(path: &str) -> Option<ImportLanguage> {
    let ext = paths::extension(path)?;
    match ext.as_str() {
        "py" | "pyi" => Some(ImportLanguage::Python),
        "rs" => Some(ImportLanguage::Rust),
        "vue" | "svelte" => Some(ImportLanguage::Script),
        other if JS_EXTENSIONS.contains(&other) => Some(ImportLanguage::Script),
        _ => None,
    }
}

/// `true` when [`extract_imports`] can find edges in files like `path`.
pub fn supports_imports(path: &str) -> bool {
    language_of(path).is_some()
}

/// Edges from `path` to the workspace files its source imports, sorted and
/// without self references.
pub fn extract_imports(path: &str, content: &str, known: &PathIndex) -> Vec<DependencyEdge> {
    let mut edges = BTreeSet::new();
    match language_of(path) {
        Some(ImportLanguage::Script) => script_imports(path, content, known, &mut edges),
        Some(ImportLanguage::Python) => python_imports(path, content, known, &mut edges),
        Some(ImportLanguage::Rust) => rust_modules(path, content, known, &mut edges),
        None => {}
    }
    edges.into_iter().filter(|edge| edge.path != path).collect()
}

fn script_imports(
    path: &str,
    content: &str,
    known: &PathIndex,
    edges: &mut BTreeSet<DependencyEdge>,
) {
    let dir = paths::parent_dir(path);
    for caps in JS_FROM.captures_iter(content) {
        let relation = if &caps[1] == "export" {
            DependencyRelation::ReExports
        } else {
            DependencyRelation::Imports
        };
        if let Some(target) = resolve_script(dir, &caps[2], known) {
            edges.insert(DependencyEdge::new(target, relation));
        }
    }
    for caps in JS_SIDE_EFFECT
        .captures_iter(content)
        .chain(JS_CALL.captures_iter(content))
    {
        if let Some(target) = resolve_script(dir, &caps[1], known) {
            edges.insert(DependencyEdge::new(target, DependencyRelation::Imports));
        }
    }
}

fn resolve_script(dir: &str, specifier: &str, known: &PathIndex) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }
    let base = join_relative(dir, specifier)?;
    if let Some(found) = known.resolve(&base) {
        return Some(found.to_string());
    }

    // ESM sources import `./x.js` while the file on disk is `x.ts`.
    let stem = match paths::extension(&base) {
        Some(ext) if JS_EXTENSIONS.contains(&ext.as_str()) => &base[..base.len() - ext.len() - 1],
        _ => base.as_str(),
    };
    JS_EXTENSIONS
        .iter()
        .map(|ext| format!("{stem}.{ext}"))
        .chain(JS_EXTENSIONS.iter().map(|ext| format!("{base}/index.{ext}")))
        .find_map(|candidate| known.resolve(&candidate).map(str::to_string))
}

fn python_imports(
    path: &str,
    content: &str,
    known: &PathIndex,
    edges: &mut BTreeSet<DependencyEdge>,
) {
    let dir = paths::parent_dir(path);
    for caps in PY_FROM.captures_iter(content) {
        let dots = caps.get(1).map_or(0, |m| m.as_str().len());
        let module = caps.get(2).map_or("", |m| m.as_str());
        let names = caps.get(3).map_or("", |m| m.as_str());

        let package_dir = if dots == 0 {
            None
        } else {
            ascend(dir, dots - 1)
        };

        match (&package_dir, module.is_empty()) {
            // `from . import a, b`: every name may be a sibling module.
            (Some(base), true) => {
                for name in imported_names(names) {
                    if let Some(target) = resolve_python(base, name, known) {
                        edges.insert(DependencyEdge::new(target, DependencyRelation::Imports));
                    }
                }
            }
            (Some(base), false) => {
                if let Some(target) = resolve_python(base, module, known) {
                    edges.insert(DependencyEdge::new(target, DependencyRelation::Imports));
                }
            }
            (None, _) => {
                if let Some(target) = resolve_python_absolute(dir, module, known) {
                    edges.insert(DependencyEdge::new(target, DependencyRelation::Imports));
                }
            }
        }
    }
    for caps in PY_IMPORT.captures_iter(content) {
        for module in imported_names(&caps[1]) {
            if let Some(target) = resolve_python_absolute(dir, module, known) {
                edges.insert(DependencyEdge::new(target, DependencyRelation::Imports));
            }
        }
    }
}

fn imported_names(list: &str) -> impl Iterator<Item = &str> {
    list.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .filter_map(|item| item.split_whitespace().next())
        .filter(|name| *name != "*" && !name.is_empty())
}

fn resolve_python(base: &str, module: &str, known: &PathIndex) -> Option<String> {
    let module_path = module.replace('.', "/");
    let joined = if base.is_empty() {
        module_path
    } else {
        format!("{base}/{module_path}")
    };
    [
        format!("{joined}.py"),
        format!("{joined}.pyi"),
        format!("{joined}/__init__.py"),
    ]
    .iter()
    .find_map(|candidate| known.resolve(candidate).map(str::to_string))
}

/// Absolute imports resolve from the importing file's directory first, then
/// from the workspace root.
fn resolve_python_absolute(dir: &str, module: &str, known: &PathIndex) -> Option<String> {
    if module.is_empty() {
        return None;
    }
    resolve_python(dir, module, known).or_else(|| resolve_python("", module, known))
}

fn rust_modules(
    path: &str,
    content: &str,
    known: &PathIndex,
    edges: &mut BTreeSet<DependencyEdge>,
) {
    let parent = paths::parent_dir(path);
    let file = paths::file_name(path);
    let module_dir = match file {
        "mod.rs" | "lib.rs" | "main.rs" => parent.to_string(),
        _ => {
            let stem = file.trim_end_matches(".rs");
            if parent.is_empty() {
                stem.to_string()
            } else {
                format!("{parent}/{stem}")
            }
        }
    };
    for caps in RUST_MOD.captures_iter(content) {
        let name = &caps[1];
        let prefix = if module_dir.is_empty() {
            String::new()
        } else {
            format!("{module_dir}/")
        };
        let target = [
            format!("{prefix}{name}.rs"),
            format!("{prefix}{name}/mod.rs"),
        ]
        .iter()
        .find_map(|candidate| known.resolve(candidate).map(str::to_string));
        if let Some(target) = target {
            edges.insert(DependencyEdge::new(
                target,
                DependencyRelation::DeclaresModule,
            ));
        }
    }
}

/// Applies `./` and `../` segments of `specifier` to `dir`; `None` when the
/// result would leave the workspace.
fn join_relative(dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = paths::dir_segments(dir);
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

fn ascend(dir: &str, levels: usize) -> Option<String> {
    let mut segments = paths::dir_segments(dir);
    for _ in 0..levels {
        segments.pop()?;
    }
    Some(segments.join("/"))
}
