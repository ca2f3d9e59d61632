//! Directory names and extensions that never carry useful context.
//!
//! Shared by the scanner (skip before recursing/statting), the sandbox rewrite
//! (inject exclusions into recursive commands) and the assembler (binary
//! placeholder).

pub const EXCLUDED_DIRS: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".yarn",
    ".npm",
    // caches / builds
    ".cache",
    "node_modules",
    "bower_components",
    ".next",
    ".nuxt",
    ".turbo",
    ".parcel-cache",
    ".svelte-kit",
    ".output",
    "build",
    "dist",
    "out",
    "coverage",
    "target",
    ".gradle",
    ".terraform",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    // vendored
    "vendor",
    "third_party",
];

pub const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd",
    // media
    "mp3", "mp4", "wav", "ogg", "flac", "avi", "mov", "mkv", "webm",
    // archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "jar", "war",
    // native / bytecode
    "exe", "dll", "so", "dylib", "a", "lib", "o", "obj", "class", "pyc", "pyo", "wasm", "bin",
    // documents / fonts / data
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "ttf", "otf", "woff", "woff2", "eot",
    "sqlite", "db", "pkl", "npy", "onnx",
];

pub fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIRS
        .iter()
        .any(|candidate| name.eq_ignore_ascii_case(candidate))
}

pub fn is_binary_extension(ext: &str) -> bool {
    BINARY_EXTENSIONS
        .iter()
        .any(|candidate| ext.eq_ignore_ascii_case(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        assert!(is_excluded_dir("Node_Modules"));
        assert!(!is_excluded_dir("src"));
        assert!(is_binary_extension("PNG"));
        assert!(!is_binary_extension("rs"));
    }
}
