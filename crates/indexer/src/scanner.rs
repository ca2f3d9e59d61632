use crate::fs::{EntryKind, WorkspaceFs};
use crate::ignore_rules::{gitignore_lines, IgnoreRules};
use crate::limits::{clamp_scan_concurrency, scan_concurrency_from_env};
use crate::scan_cache::ScanCache;
use crate::stats::ScanStats;
use context_protocol::{paths, CandidateFile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// The TTL lives on the [`ScanCache`] itself; this only opts a scan out.
#[derive(Debug, Clone)]
pub struct ScanCacheOptions {
    pub enabled: bool,
}

impl Default for ScanCacheOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Gitignore-style patterns applied on top of the built-in deny-list.
    pub ignore_patterns: Vec<String>,
    /// Lower-case extensions without the dot.
    pub extension_allow_list: Vec<String>,
    /// Exact file names accepted regardless of extension.
    pub file_name_allow_list: Vec<String>,
    pub max_file_size_bytes: u64,
    pub concurrency_limit: usize,
    /// Also honour `<root>/.gitignore`.
    pub respect_gitignore: bool,
    pub cache: ScanCacheOptions,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            extension_allow_list: SUPPORTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            file_name_allow_list: SUPPORTED_FILE_NAMES.iter().map(|s| s.to_string()).collect(),
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            concurrency_limit: scan_concurrency_from_env(),
            respect_gitignore: true,
            cache: ScanCacheOptions::default(),
        }
    }
}

impl ScanOptions {
    fn accepts_name(&self, rel_path: &str) -> bool {
        let name = paths::file_name(rel_path);
        if self
            .file_name_allow_list
            .iter()
            .any(|candidate| candidate == name)
        {
            return true;
        }
        paths::extension(rel_path).is_some_and(|ext| {
            self.extension_allow_list
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(&ext))
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Sorted by path.
    pub files: Arc<Vec<CandidateFile>>,
    pub stats: ScanStats,
    /// The root could not be read; `files` is empty.
    pub no_workspace: bool,
    /// Cancellation fired mid-scan; `files` is partial and was not cached.
    pub cancelled: bool,
}

impl ScanOutcome {
    fn no_workspace(stats: ScanStats) -> Self {
        Self {
            files: Arc::new(Vec::new()),
            stats,
            no_workspace: true,
            cancelled: false,
        }
    }
}

/// Bounded-concurrency walker producing the candidate set for a workspace.
pub struct FileScanner {
    fs: Arc<dyn WorkspaceFs>,
    cache: Arc<ScanCache>,
}

struct DirVisit {
    files: Vec<CandidateFile>,
    subdirs: Vec<String>,
    stats: ScanStats,
}

struct WalkContext {
    fs: Arc<dyn WorkspaceFs>,
    root: PathBuf,
    rules: IgnoreRules,
    options: ScanOptions,
    permits: Semaphore,
    cancel: CancellationToken,
}

impl FileScanner {
    pub fn new(fs: Arc<dyn WorkspaceFs>, cache: Arc<ScanCache>) -> Self {
        Self { fs, cache }
    }

    pub fn cache(&self) -> &Arc<ScanCache> {
        &self.cache
    }

    /// Enumerates candidate files under `root`.
    ///
    /// Never fails: unreadable roots produce `no_workspace`, and per-entry
    /// errors are logged, counted and skipped.
    pub async fn scan(
        &self,
        root: &Path,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> ScanOutcome {
        let started = Instant::now();

        if options.cache.enabled {
            if let Some(files) = self.cache.get(root) {
                log::debug!("scan cache hit for {}", root.display());
                let stats = ScanStats {
                    files: files.len(),
                    from_cache: true,
                    ..ScanStats::default()
                };
                return ScanOutcome {
                    files,
                    stats,
                    no_workspace: false,
                    cancelled: false,
                };
            }
        }

        let generation = self.cache.generation(root);
        match self.fs.stat(root).await {
            Ok(stat) if stat.kind == EntryKind::Directory => {}
            Ok(_) => {
                log::warn!("Workspace root is not a directory: {}", root.display());
                return ScanOutcome::no_workspace(ScanStats::default());
            }
            Err(err) => {
                log::warn!("Workspace root unreadable {}: {err}", root.display());
                return ScanOutcome::no_workspace(ScanStats::default());
            }
        }

        let rules = self.load_rules(root, options).await;
        let ctx = Arc::new(WalkContext {
            fs: Arc::clone(&self.fs),
            root: root.to_path_buf(),
            rules,
            options: options.clone(),
            permits: Semaphore::new(clamp_scan_concurrency(options.concurrency_limit)),
            cancel: cancel.clone(),
        });

        let mut stats = ScanStats::default();
        let mut files = Vec::new();
        let mut pending: JoinSet<DirVisit> = JoinSet::new();
        pending.spawn(visit_dir(Arc::clone(&ctx), String::new()));

        while let Some(joined) = pending.join_next().await {
            let visit = match joined {
                Ok(visit) => visit,
                Err(err) => {
                    log::warn!("Scan worker failed: {err}");
                    stats.add_error(format!("worker: {err}"));
                    continue;
                }
            };
            files.extend(visit.files);
            stats.merge(visit.stats);
            if cancel.is_cancelled() {
                continue;
            }
            for subdir in visit.subdirs {
                pending.spawn(visit_dir(Arc::clone(&ctx), subdir));
            }
        }

        files.sort();
        files.dedup();
        stats.files = files.len();
        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let cancelled = cancel.is_cancelled();
        let files = Arc::new(files);
        if cancelled {
            log::info!(
                "Scan of {} cancelled after {} files",
                root.display(),
                files.len()
            );
        } else {
            log::info!(
                "Found {} source files in {} ms ({} dirs, {} errors)",
                files.len(),
                stats.elapsed_ms,
                stats.directories,
                stats.errors.len()
            );
            if options.cache.enabled
                && !self.cache.insert_if_current(root, generation, Arc::clone(&files))
            {
                log::debug!(
                    "Workspace {} changed during the scan; result not cached",
                    root.display()
                );
            }
        }

        ScanOutcome {
            files,
            stats,
            no_workspace: false,
            cancelled,
        }
    }

    async fn load_rules(&self, root: &Path, options: &ScanOptions) -> IgnoreRules {
        let mut lines = Vec::new();
        if options.respect_gitignore {
            if let Ok(bytes) = self.fs.read(&root.join(".gitignore")).await {
                lines = gitignore_lines(&String::from_utf8_lossy(&bytes));
            }
        }
        match IgnoreRules::new(root, &options.ignore_patterns, &lines) {
            Ok(rules) => rules,
            Err(err) => {
                log::warn!("Ignoring invalid ignore patterns ({err}); using deny-list only");
                IgnoreRules::empty()
            }
        }
    }
}

async fn visit_dir(ctx: Arc<WalkContext>, rel_dir: String) -> DirVisit {
    let mut visit = DirVisit {
        files: Vec::new(),
        subdirs: Vec::new(),
        stats: ScanStats::default(),
    };
    if ctx.cancel.is_cancelled() {
        return visit;
    }
    let Ok(_permit) = ctx.permits.acquire().await else {
        return visit;
    };

    let abs_dir = join_rel(&ctx.root, &rel_dir);
    let entries = match ctx.fs.list_dir(&abs_dir).await {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Failed to read directory {}: {err}", abs_dir.display());
            visit
                .stats
                .add_error(format!("{}: {err}", display_rel(&rel_dir)));
            return visit;
        }
    };
    visit.stats.directories = 1;

    for entry in entries {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let rel_path = if rel_dir.is_empty() {
            entry.name.clone()
        } else {
            format!("{rel_dir}/{}", entry.name)
        };

        match entry.kind {
            EntryKind::Directory => {
                if ctx.rules.skip_dir(&rel_path) {
                    visit.stats.skipped_ignored += 1;
                } else {
                    visit.subdirs.push(rel_path);
                }
            }
            EntryKind::File => {
                if ctx.rules.skip_file(&rel_path) || !ctx.options.accepts_name(&rel_path) {
                    visit.stats.skipped_ignored += 1;
                    continue;
                }
                let abs_path = join_rel(&ctx.root, &rel_path);
                match ctx.fs.stat(&abs_path).await {
                    Ok(stat) if stat.size > ctx.options.max_file_size_bytes => {
                        log::debug!(
                            "Skipping large file {} ({} bytes > {})",
                            rel_path,
                            stat.size,
                            ctx.options.max_file_size_bytes
                        );
                        visit.stats.skipped_size += 1;
                    }
                    Ok(stat) => {
                        visit
                            .files
                            .push(CandidateFile::new(rel_path, abs_path, stat.size));
                    }
                    Err(err) => {
                        log::warn!("Failed to stat {rel_path}: {err}");
                        visit.stats.add_error(format!("{rel_path}: {err}"));
                    }
                }
            }
            EntryKind::Symlink | EntryKind::Other => {
                visit.stats.skipped_ignored += 1;
            }
        }
    }

    visit
}

fn join_rel(root: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() {
        return root.to_path_buf();
    }
    rel.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

fn display_rel(rel: &str) -> &str {
    if rel.is_empty() {
        "."
    } else {
        rel
    }
}

const SUPPORTED_FILE_NAMES: &[&str] = &[
    "Dockerfile",
    "Makefile",
    "makefile",
    "Justfile",
    "Gemfile",
    "Rakefile",
    "Procfile",
    ".gitignore",
    ".env.example",
];

/// Broad set of extensions (code + docs + infra).
const SUPPORTED_EXTENSIONS: &[&str] = &[
    // General purpose languages
    "rs", "py", "pyw", "js", "mjs", "cjs", "ts", "tsx", "jsx", "java", "kt", "kts", "go", "c", "h",
    "cpp", "cc", "cxx", "hpp", "hh", "hxx", "cs", "rb", "swift", "php", "scala", "dart", "zig",
    "lua", "ex", "exs", "clj", "fs", "fsi", "el", "vue", "svelte",
    // Scripts
    "sh", "bash", "zsh", "fish", "ps1", "bat", "cmd",
    // Docs
    "md", "mdx", "rst", "adoc", "txt",
    // Config / data / infra
    "yaml", "yml", "json", "toml", "ini", "cfg", "conf", "properties", "gradle", "groovy", "xml",
    "html", "css", "scss", "less", "sql", "tf", "tfvars", "hcl", "proto", "graphql",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{LocalFs, MemoryFs};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn scanner(fs: Arc<dyn WorkspaceFs>) -> FileScanner {
        FileScanner::new(fs, Arc::new(ScanCache::default()))
    }

    fn paths_of(outcome: &ScanOutcome) -> Vec<String> {
        outcome.files.iter().map(|f| f.path.clone()).collect()
    }

    #[tokio::test]
    async fn skips_ignored_directories_and_binaries() {
        let temp = tempdir().unwrap();
        let datasets_dir = temp.path().join("datasets").join("wip");
        fs::create_dir_all(&datasets_dir).unwrap();
        fs::create_dir_all(temp.path().join("node_modules").join("dep")).unwrap();
        fs::write(datasets_dir.join("data.json"), b"{}").unwrap();
        fs::write(temp.path().join("node_modules/dep/index.js"), b"x").unwrap();
        fs::write(temp.path().join("logo.png"), b"\x89PNG").unwrap();
        fs::write(temp.path().join("src.rs"), b"fn main() {}").unwrap();
        fs::write(temp.path().join(".gitignore"), b"/datasets").unwrap();

        let outcome = scanner(Arc::new(LocalFs))
            .scan(temp.path(), &ScanOptions::default(), &CancellationToken::new())
            .await;

        assert_eq!(paths_of(&outcome), vec![".gitignore", "src.rs"]);
        assert!(!outcome.no_workspace);
    }

    #[tokio::test]
    async fn size_cap_applies_after_stat() {
        let fs = MemoryFs::new()
            .with_file("/ws/small.rs", "fn a() {}")
            .with_file("/ws/big.rs", vec![b'x'; 64]);
        let options = ScanOptions {
            max_file_size_bytes: 32,
            ..ScanOptions::default()
        };
        let outcome = scanner(Arc::new(fs))
            .scan(Path::new("/ws"), &options, &CancellationToken::new())
            .await;
        assert_eq!(paths_of(&outcome), vec!["small.rs"]);
        assert_eq!(outcome.stats.skipped_size, 1);
    }

    #[tokio::test]
    async fn stat_failure_skips_entry_only() {
        let fs = MemoryFs::new()
            .with_file("/ws/a.rs", "")
            .with_file("/ws/b.rs", "")
            .with_file("/ws/locked/c.rs", "");
        fs.fail_on("/ws/a.rs");
        fs.fail_on("/ws/locked");
        let outcome = scanner(Arc::new(fs))
            .scan(Path::new("/ws"), &ScanOptions::default(), &CancellationToken::new())
            .await;
        assert_eq!(paths_of(&outcome), vec!["b.rs"]);
        assert_eq!(outcome.stats.errors.len(), 2);
    }

    #[tokio::test]
    async fn unreadable_root_is_no_workspace() {
        let outcome = scanner(Arc::new(MemoryFs::new()))
            .scan(
                Path::new("/missing"),
                &ScanOptions::default(),
                &CancellationToken::new(),
            )
            .await;
        assert!(outcome.no_workspace);
        assert!(outcome.files.is_empty());
    }

    #[tokio::test]
    async fn allow_list_accepts_exact_names() {
        let fs = MemoryFs::new()
            .with_file("/ws/Makefile", "all:")
            .with_file("/ws/notes.xyz", "?")
            .with_file("/ws/deep/a/b/c/lib.py", "pass");
        let outcome = scanner(Arc::new(fs))
            .scan(Path::new("/ws"), &ScanOptions::default(), &CancellationToken::new())
            .await;
        assert_eq!(paths_of(&outcome), vec!["Makefile", "deep/a/b/c/lib.py"]);
        assert_eq!(outcome.stats.directories, 5);
    }

    #[tokio::test]
    async fn cancelled_scan_is_partial_and_uncached() {
        let fs = MemoryFs::new().with_file("/ws/a.rs", "");
        let scanner = scanner(Arc::new(fs));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = scanner
            .scan(Path::new("/ws"), &ScanOptions::default(), &cancel)
            .await;
        assert!(outcome.cancelled);
        assert!(outcome.files.is_empty());
        assert!(scanner.cache().get(Path::new("/ws")).is_none());
    }
}
