use crate::error::{GraphError, Result};
use crate::graph::DependencyGraph;
use crate::imports::{extract_imports, supports_imports};
use crate::types::{DependencyEdge, GraphBuildStats};
use context_indexer::{clamp_scan_concurrency, WorkspaceFs};
use context_protocol::paths::PathIndex;
use context_protocol::CandidateFile;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct GraphBuildOptions {
    /// Concurrent file reads.
    pub concurrency: usize,
    /// Larger files are kept as nodes but not parsed.
    pub max_file_bytes: u64,
}

impl Default for GraphBuildOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_file_bytes: 512 * 1024,
        }
    }
}

type FileImports = std::result::Result<(String, Vec<DependencyEdge>), String>;

impl DependencyGraph {
    /// Reads every candidate the extractor understands and links it to the
    /// candidates it imports. Unreadable files are counted, not fatal.
    pub async fn build(
        fs: Arc<dyn WorkspaceFs>,
        candidates: &[CandidateFile],
        options: &GraphBuildOptions,
        cancel: &CancellationToken,
    ) -> Result<(Self, GraphBuildStats)> {
        let started = Instant::now();
        let known = Arc::new(PathIndex::new(
            candidates.iter().map(|candidate| candidate.path.as_str()),
        ));
        let permits = Arc::new(Semaphore::new(clamp_scan_concurrency(options.concurrency)));

        let mut graph = Self::new();
        let mut pending: JoinSet<FileImports> = JoinSet::new();
        for candidate in candidates {
            graph.add_file(&candidate.path);
            if !supports_imports(&candidate.path) || candidate.size_bytes > options.max_file_bytes
            {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }
            pending.spawn(read_imports(
                Arc::clone(&fs),
                candidate.clone(),
                Arc::clone(&known),
                Arc::clone(&permits),
                cancel.clone(),
            ));
        }

        let mut stats = GraphBuildStats::default();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(Ok((path, edges))) => {
                    stats.files_read += 1;
                    for edge in edges {
                        if graph.add_edge(&path, &edge.path, edge.relation) {
                            stats.edges += 1;
                        }
                    }
                }
                Ok(Err(message)) => {
                    log::debug!("Dependency read failed: {message}");
                    stats.files_failed += 1;
                }
                Err(err) => {
                    return Err(GraphError::BuildError(format!("worker: {err}")));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }

        stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::info!(
            "Built dependency graph: {} files, {} edges in {} ms",
            graph.file_count(),
            graph.edge_count(),
            stats.elapsed_ms
        );
        Ok((graph, stats))
    }
}

async fn read_imports(
    fs: Arc<dyn WorkspaceFs>,
    candidate: CandidateFile,
    known: Arc<PathIndex>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) -> FileImports {
    if cancel.is_cancelled() {
        return Ok((candidate.path, Vec::new()));
    }
    let _permit = permits
        .acquire()
        .await
        .map_err(|err| format!("{}: {err}", candidate.path))?;
    let bytes = fs
        .read(&candidate.absolute_id)
        .await
        .map_err(|err| format!("{}: {err}", candidate.path))?;
    let content = String::from_utf8_lossy(&bytes);
    let edges = extract_imports(&candidate.path, &content, &known);
    Ok((candidate.path, edges))
}
