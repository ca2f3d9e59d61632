use crate::config::EngineConfig;
use crate::symbols::{gather_cursor_signals, gather_document_symbols, SymbolProvider};
use anyhow::Result;
use context_agent::{
    ModelClient, SelectionCache, SelectionController, SelectionRequest, SelectionSource,
};
use context_graph::{DependencyGraph, DependencyProvider, GraphBuildOptions};
use context_indexer::{
    CacheStats, FileScanner, FsEvent, LocalFs, ScanCache, ScanOutcome, ScanWatcher, TtlCache,
    WorkspaceFs,
};
use context_pack::{
    AssemblyInput, ContextAssembler, OrderingSignals, RecentChange, SectionKind, TruncationEvent,
};
use context_protocol::paths::{normalize_rel_path, relative_to, PathIndex};
use context_protocol::{
    elapsed_ms, CandidateFile, FileSelection, LogStatusSink, PerfMetrics, Position,
    StatusSink, SymbolDetail, SymbolRelations, NO_WORKSPACE_PAYLOAD,
};
use context_sandbox::CommandSandbox;
use context_search::{score, RelevanceScore, RelevanceSignals};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const GRAPH_CACHE_CAPACITY: usize = 16;

/// One request for context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextRequest {
    /// `None` when the host has no workspace open.
    pub root: Option<PathBuf>,
    pub request: String,
    /// Workspace-relative or absolute under `root`.
    pub active_file: Option<String>,
    pub cursor: Option<Position>,
    pub recent_changes: Vec<RecentChange>,
    /// Paths the host already associates with the topic of the request.
    pub topic_paths: Vec<String>,
    pub operation_id: Option<String>,
    pub recompute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextResult {
    pub prompt: String,
    pub included_paths: Vec<String>,
    pub metrics: PerfMetrics,
    /// `None` when there was no workspace to select from.
    pub selection_source: Option<SelectionSource>,
    pub turns_used: usize,
    pub skipped_for_size: usize,
    pub truncations: Vec<TruncationEvent>,
    pub omitted_sections: Vec<SectionKind>,
    pub cancelled: bool,
}

impl ContextResult {
    fn no_workspace() -> Self {
        Self {
            prompt: NO_WORKSPACE_PAYLOAD.to_string(),
            included_paths: Vec::new(),
            metrics: PerfMetrics::default(),
            selection_source: None,
            turns_used: 0,
            skipped_for_size: 0,
            truncations: Vec::new(),
            omitted_sections: Vec::new(),
            cancelled: false,
        }
    }

    fn cancelled(metrics: PerfMetrics) -> Self {
        Self {
            prompt: String::new(),
            metrics,
            selection_source: Some(SelectionSource::Cancelled),
            cancelled: true,
            ..Self::no_workspace()
        }
    }

    pub fn is_no_workspace(&self) -> bool {
        self.selection_source.is_none() && self.prompt == NO_WORKSPACE_PAYLOAD
    }
}

/// Shortlist inputs computed before selection.
pub struct Ranking {
    pub scan: ScanOutcome,
    pub active_file: Option<String>,
    pub scores: Vec<RelevanceScore>,
    pub relations: SymbolRelations,
    pub dependency_paths: BTreeSet<String>,
    pub active_symbol: Option<SymbolDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineCacheStats {
    pub scan: CacheStats,
    pub dependency_graphs: CacheStats,
    pub selections: CacheStats,
}

/// Scan -> dependencies -> symbols -> score -> select -> assemble.
///
/// One engine per workspace session: its caches are shared by every request
/// and cleared through [`clear_caches`](Self::clear_caches) or file events.
pub struct ContextEngine {
    config: EngineConfig,
    fs: Arc<dyn WorkspaceFs>,
    scanner: FileScanner,
    scan_cache: Arc<ScanCache>,
    graph_cache: TtlCache<Arc<DependencyGraph>>,
    selection_cache: Arc<SelectionCache>,
    sandbox: CommandSandbox,
    model: Option<Arc<dyn ModelClient>>,
    symbols: Option<Arc<dyn SymbolProvider>>,
    dependencies: Option<Arc<dyn DependencyProvider>>,
    status: Arc<dyn StatusSink>,
}

impl ContextEngine {
    pub fn new(config: EngineConfig) -> Self {
        let fs: Arc<dyn WorkspaceFs> = Arc::new(LocalFs);
        let scan_cache = Arc::new(ScanCache::new(config.cache.scan_ttl()));
        let selection_cache = Arc::new(SelectionCache::new(config.cache.selection_ttl()));
        Self {
            scanner: FileScanner::new(Arc::clone(&fs), Arc::clone(&scan_cache)),
            graph_cache: TtlCache::new(config.cache.scan_ttl(), GRAPH_CACHE_CAPACITY),
            sandbox: CommandSandbox::new(config.sandbox.clone()),
            fs,
            scan_cache,
            selection_cache,
            model: None,
            symbols: None,
            dependencies: None,
            status: Arc::new(LogStatusSink),
            config,
        }
    }

    /// Replaces the filesystem; the scanner follows it.
    pub fn with_fs(mut self, fs: Arc<dyn WorkspaceFs>) -> Self {
        self.scanner = FileScanner::new(Arc::clone(&fs), Arc::clone(&self.scan_cache));
        self.fs = fs;
        self
    }

    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_symbols(mut self, symbols: Arc<dyn SymbolProvider>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Uses `provider` instead of building a graph from imports.
    pub fn with_dependencies(mut self, provider: Arc<dyn DependencyProvider>) -> Self {
        self.dependencies = Some(provider);
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sandbox(&self) -> &CommandSandbox {
        &self.sandbox
    }

    pub async fn scan(&self, root: &Path, cancel: &CancellationToken) -> ScanOutcome {
        self.scanner
            .scan(root, &self.config.scan.to_options(), cancel)
            .await
    }

    /// Scores every candidate of `root` for the request. `None` when the
    /// root is not a readable workspace.
    pub async fn rank(
        &self,
        root: &Path,
        request: &ContextRequest,
        cancel: &CancellationToken,
        metrics: &mut PerfMetrics,
    ) -> Option<Ranking> {
        let started = Instant::now();
        let scan = self.scan(root, cancel).await;
        metrics.scan_ms = elapsed_ms(started);
        metrics.candidate_count = scan.files.len();
        if scan.no_workspace {
            return None;
        }
        let active_file = request
            .active_file
            .as_deref()
            .and_then(|raw| workspace_relative(root, raw));

        let started = Instant::now();
        let dependencies = self.dependency_provider(root, &scan.files, cancel).await;
        metrics.dependency_ms = elapsed_ms(started);

        let started = Instant::now();
        let cursor = match &self.symbols {
            Some(provider) => {
                gather_cursor_signals(
                    provider.as_ref(),
                    active_file.as_deref(),
                    request.cursor,
                    cancel,
                )
                .await
            }
            None => Default::default(),
        };
        metrics.symbol_ms = elapsed_ms(started);

        let signals = RelevanceSignals::new(active_file.as_deref())
            .with_symbols(cursor.relations.clone())
            .with_provider(dependencies.as_ref())
            .with_query(&request.request);
        let scores = score(&scan.files, &signals, &self.config.relevance);

        let mut dependency_paths = BTreeSet::new();
        if let Some(active) = &signals.active_file {
            for edges in [&signals.forward_deps, &signals.reverse_deps] {
                if let Some(paths) = edges.get(active) {
                    dependency_paths.extend(paths.iter().cloned());
                }
            }
        }

        Some(Ranking {
            scan,
            active_file: signals.active_file,
            scores,
            relations: cursor.relations,
            dependency_paths,
            active_symbol: cursor.active_symbol,
        })
    }

    /// Runs the whole pipeline. Never fails: provider and model errors
    /// degrade to heuristics and a missing workspace yields the sentinel
    /// payload. Cancellation returns whatever was assembled so far, which is
    /// nothing before assembly starts.
    pub async fn build_context(
        &self,
        request: &ContextRequest,
        cancel: &CancellationToken,
    ) -> ContextResult {
        let Some(root) = request.root.as_deref() else {
            return ContextResult::no_workspace();
        };
        let mut metrics = PerfMetrics::default();
        self.status.post_status("Scanning workspace", false);
        let Some(ranking) = self.rank(root, request, cancel, &mut metrics).await else {
            return ContextResult::no_workspace();
        };
        if ranking.scan.cancelled || cancel.is_cancelled() {
            return ContextResult::cancelled(metrics);
        }

        let preselected: Vec<FileSelection> = ranking
            .scores
            .iter()
            .take(self.config.relevance.max_candidates)
            .map(|scored| FileSelection::whole(scored.path.clone()))
            .collect();

        let started = Instant::now();
        let controller = SelectionController::new(
            self.model.clone(),
            self.sandbox.clone(),
            Arc::clone(&self.selection_cache),
            self.config.agent.clone(),
            Arc::clone(&self.status),
        );
        let outcome = controller
            .select(
                &SelectionRequest {
                    root: root.to_path_buf(),
                    request: request.request.clone(),
                    active_file: ranking.active_file.clone(),
                    candidates: ranking.scan.files.to_vec(),
                    preselected,
                    operation_id: request.operation_id.clone(),
                    recompute: request.recompute,
                },
                cancel,
            )
            .await;
        metrics.selection_ms = elapsed_ms(started);
        if outcome.source == SelectionSource::Cancelled || cancel.is_cancelled() {
            return ContextResult::cancelled(metrics);
        }

        let selections = retain_scanned(outcome.selections, &ranking.scan.files);
        let selected_paths: Vec<String> = selections.iter().map(|s| s.path.clone()).collect();

        let started = Instant::now();
        let symbols = match &self.symbols {
            Some(provider) => {
                gather_document_symbols(Arc::clone(provider), &selected_paths, cancel).await
            }
            None => Vec::new(),
        };
        metrics.symbol_ms += elapsed_ms(started);

        let input = AssemblyInput {
            root: root.to_path_buf(),
            selections,
            workspace_paths: ranking.scan.files.iter().map(|f| f.path.clone()).collect(),
            recent_changes: request.recent_changes.clone(),
            symbols,
            active_symbol: ranking.active_symbol,
            ordering: OrderingSignals {
                active_file: ranking.active_file.clone(),
                symbol_paths: ranking.relations.all_paths(),
                dependency_paths: ranking.dependency_paths,
                topic_paths: request
                    .topic_paths
                    .iter()
                    .filter_map(|raw| workspace_relative(root, raw))
                    .collect(),
            },
        };

        let started = Instant::now();
        self.status.post_status("Assembling context", false);
        let assembled = ContextAssembler::new(Arc::clone(&self.fs))
            .with_limits(self.config.sections)
            .assemble(&input, &self.config.budget, cancel)
            .await;
        metrics.assembly_ms = elapsed_ms(started);
        metrics.processed_count = assembled.included_paths.len();

        log::info!(
            "Context for {}: {} of {} files, {} chars, source {} ({} ms)",
            root.display(),
            metrics.processed_count,
            metrics.candidate_count,
            assembled.text.chars().count(),
            outcome.source.as_str(),
            metrics.total_ms()
        );

        ContextResult {
            prompt: assembled.text,
            included_paths: assembled.included_paths,
            metrics,
            selection_source: Some(outcome.source),
            turns_used: outcome.turns_used,
            skipped_for_size: assembled.skipped_for_size,
            truncations: assembled.truncations,
            omitted_sections: assembled.omitted_sections,
            cancelled: assembled.cancelled,
        }
    }

    async fn dependency_provider(
        &self,
        root: &Path,
        files: &[CandidateFile],
        cancel: &CancellationToken,
    ) -> Arc<dyn DependencyProvider> {
        if let Some(provider) = &self.dependencies {
            return Arc::clone(provider);
        }
        let key = ScanCache::key(root);
        if let Some(graph) = self.graph_cache.get(&key) {
            return graph;
        }
        let options = GraphBuildOptions {
            concurrency: self.config.scan.concurrency,
            ..GraphBuildOptions::default()
        };
        match DependencyGraph::build(Arc::clone(&self.fs), files, &options, cancel).await {
            Ok((graph, stats)) => {
                log::debug!(
                    "Dependency graph for {}: {} files read, {} edges",
                    root.display(),
                    stats.files_read,
                    stats.edges
                );
                let graph = Arc::new(graph);
                self.graph_cache.insert(key, Arc::clone(&graph));
                graph
            }
            Err(err) => {
                log::warn!("Dependency graph unavailable for {}: {err}", root.display());
                Arc::new(DependencyGraph::new())
            }
        }
    }

    /// Applies a host file event. Path-set changes drop the scan and every
    /// derived cache for `root`; content changes drop the dependency graph
    /// only.
    pub fn handle_fs_event(&self, root: &Path, event: &FsEvent) {
        self.graph_cache.invalidate(&ScanCache::key(root));
        if self.scan_cache.on_fs_event(root, event) || event.alters_path_set() {
            self.selection_cache.clear(Some(root));
        }
    }

    /// `Some(root)` drops one workspace, `None` everything.
    pub fn clear_caches(&self, root: Option<&Path>) {
        self.scan_cache.clear(root);
        match root {
            Some(root) => {
                self.graph_cache.invalidate(&ScanCache::key(root));
            }
            None => self.graph_cache.clear(),
        }
        self.selection_cache.clear(root);
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            scan: self.scan_cache.stats(),
            dependency_graphs: self.graph_cache.stats(),
            selections: self.selection_cache.stats(),
        }
    }

    /// Watches `root` and keeps every cache coherent with disk. The watcher
    /// stops when the returned handle and task are dropped.
    pub fn watch(self: &Arc<Self>, root: &Path) -> Result<(ScanWatcher, JoinHandle<()>)> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ScanWatcher::start(root, Arc::clone(&self.scan_cache), Some(tx))?;
        let engine = Arc::clone(self);
        let root = root.to_path_buf();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.handle_fs_event(&root, &event);
            }
        });
        Ok((watcher, task))
    }
}

/// Workspace-relative form of `raw`, which may be absolute under `root`.
fn workspace_relative(root: &Path, raw: &str) -> Option<String> {
    let candidate = Path::new(raw);
    let relative = if candidate.is_absolute() {
        relative_to(root, candidate)?
    } else {
        normalize_rel_path(raw)
    };
    (!relative.is_empty()).then_some(relative)
}

/// Drops selections whose path is not in the scan, restoring canonical
/// casing for the rest.
fn retain_scanned(selections: Vec<FileSelection>, files: &[CandidateFile]) -> Vec<FileSelection> {
    let index = PathIndex::new(files.iter().map(|f| f.path.as_str()));
    selections
        .into_iter()
        .filter_map(|mut selection| match index.resolve(&selection.path) {
            Some(canonical) => {
                selection.path = canonical.to_string();
                Some(selection)
            }
            None => {
                log::debug!("Dropping selection outside the scan: {}", selection.path);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn relative_paths_are_normalized() {
        let root = Path::new("/ws");
        assert_eq!(
            workspace_relative(root, "/ws/src/lib.rs").as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(
            workspace_relative(root, "./src/lib.rs").as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(workspace_relative(root, "/elsewhere/x.rs"), None);
        assert_eq!(workspace_relative(root, ""), None);
    }

    #[test]
    fn selections_outside_scan_are_dropped() {
        let files = vec![
            CandidateFile::new("src/App.ts", "/ws/src/App.ts", 1),
            CandidateFile::new("src/b.ts", "/ws/src/b.ts", 1),
        ];
        let kept = retain_scanned(
            vec![
                FileSelection::range("src/app.ts", 2, 4),
                FileSelection::whole("src/gone.ts"),
                FileSelection::whole("src/b.ts"),
            ],
            &files,
        );
        assert_eq!(
            kept,
            vec![
                FileSelection::range("src/App.ts", 2, 4),
                FileSelection::whole("src/b.ts"),
            ]
        );
    }
}
