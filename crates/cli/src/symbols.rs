//! Symbol signals for scoring and assembly.
//!
//! The provider (a language server, an editor host) lives outside this
//! workspace. Its answers are normalized here into [`SymbolRelations`] and
//! flat symbol lists; failures only lose signals.

use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use context_protocol::paths::normalize_rel_path;
use context_protocol::{OneOrMany, Position, SymbolDetail, SymbolInfo, SymbolLocation, SymbolRelations};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Concurrent `document_symbols` calls per request.
pub const SYMBOL_CONCURRENCY: usize = 4;

#[async_trait]
pub trait SymbolProvider: Send + Sync {
    /// Paths related to the symbol at `position` in `path`.
    async fn relations(&self, path: &str, position: Position) -> Result<SymbolRelations>;

    async fn document_symbols(&self, path: &str) -> Result<Vec<SymbolInfo>>;

    async fn active_symbol_detail(
        &self,
        path: &str,
        position: Position,
    ) -> Result<Option<SymbolDetail>>;
}

/// What the provider knows about the cursor position.
#[derive(Debug, Clone, Default)]
pub struct CursorSignals {
    pub relations: SymbolRelations,
    pub active_symbol: Option<SymbolDetail>,
}

/// Relations for the active file and, with a cursor, the symbol under it.
pub async fn gather_cursor_signals(
    provider: &dyn SymbolProvider,
    active_file: Option<&str>,
    cursor: Option<Position>,
    cancel: &CancellationToken,
) -> CursorSignals {
    let mut signals = CursorSignals::default();
    let Some(active) = active_file else {
        return signals;
    };
    if cancel.is_cancelled() {
        return signals;
    }
    let position = cursor.unwrap_or_default();
    match provider.relations(active, position).await {
        Ok(relations) => signals.relations = relations,
        Err(err) => log::warn!("Symbol relations failed for {active}: {err:#}"),
    }
    if cursor.is_some() && !cancel.is_cancelled() {
        match provider.active_symbol_detail(active, position).await {
            Ok(detail) => signals.active_symbol = detail,
            Err(err) => log::warn!("Active symbol lookup failed for {active}: {err:#}"),
        }
    }
    signals
}

/// Document symbols of `paths`, at most [`SYMBOL_CONCURRENCY`] requests in
/// flight. Sorted by path then line; failed files contribute nothing.
pub async fn gather_document_symbols(
    provider: Arc<dyn SymbolProvider>,
    paths: &[String],
    cancel: &CancellationToken,
) -> Vec<SymbolInfo> {
    let permits = Arc::new(Semaphore::new(SYMBOL_CONCURRENCY));
    let mut pending: JoinSet<(String, Result<Vec<SymbolInfo>>)> = JoinSet::new();
    for path in paths {
        if cancel.is_cancelled() {
            break;
        }
        let provider = Arc::clone(&provider);
        let permits = Arc::clone(&permits);
        let cancel = cancel.clone();
        let path = path.clone();
        pending.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (path, Ok(Vec::new()));
            };
            if cancel.is_cancelled() {
                return (path, Ok(Vec::new()));
            }
            let result = provider.document_symbols(&path).await;
            (path, result)
        });
    }

    let mut symbols = Vec::new();
    while let Some(joined) = pending.join_next().await {
        match joined {
            Ok((_, Ok(found))) => symbols.extend(found),
            Ok((path, Err(err))) => log::debug!("Document symbols failed for {path}: {err:#}"),
            Err(err) => log::warn!("Symbol worker failed: {err}"),
        }
    }
    symbols.sort_by(|a, b| (&a.path, a.line, &a.name).cmp(&(&b.path, b.line, &b.name)));
    symbols
}

/// Provider answering from a fixed JSON document.
///
/// ```json
/// {
///   "definitions": {"path": "src/auth.ts", "line": 3},
///   "implementations": [{"path": "src/impl.ts", "line": 1}],
///   "symbols": [{"name": "login", "kind": "function", "path": "src/auth.ts", "line": 3}],
///   "active_symbol": null
/// }
/// ```
///
/// Relation fields accept one location or a list.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbols {
    relations: SymbolRelations,
    symbols: Vec<SymbolInfo>,
    active_symbol: Option<SymbolDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StaticSymbolsFile {
    definitions: OneOrMany<SymbolLocation>,
    type_definitions: OneOrMany<SymbolLocation>,
    implementations: OneOrMany<SymbolLocation>,
    referenced_types: OneOrMany<SymbolLocation>,
    call_hierarchy: OneOrMany<SymbolLocation>,
    symbols: Vec<SymbolInfo>,
    active_symbol: Option<SymbolDetail>,
}

impl StaticSymbols {
    pub fn new(
        relations: SymbolRelations,
        symbols: Vec<SymbolInfo>,
        active_symbol: Option<SymbolDetail>,
    ) -> Self {
        Self {
            relations,
            symbols,
            active_symbol,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: StaticSymbolsFile =
            serde_json::from_str(raw).context("Invalid symbols document")?;
        let mut relations = SymbolRelations::default();
        SymbolRelations::extend_from(&mut relations.definitions, file.definitions);
        SymbolRelations::extend_from(&mut relations.type_definitions, file.type_definitions);
        SymbolRelations::extend_from(&mut relations.implementations, file.implementations);
        SymbolRelations::extend_from(&mut relations.referenced_types, file.referenced_types);
        SymbolRelations::extend_from(&mut relations.call_hierarchy, file.call_hierarchy);
        let symbols = file
            .symbols
            .into_iter()
            .map(|mut symbol| {
                symbol.path = normalize_rel_path(&symbol.path);
                symbol
            })
            .collect();
        Ok(Self::new(relations, symbols, file.active_symbol))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read symbols file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("In {}", path.display()))
    }
}

#[async_trait]
impl SymbolProvider for StaticSymbols {
    async fn relations(&self, _path: &str, _position: Position) -> Result<SymbolRelations> {
        Ok(self.relations.clone())
    }

    async fn document_symbols(&self, path: &str) -> Result<Vec<SymbolInfo>> {
        Ok(self
            .symbols
            .iter()
            .filter(|symbol| symbol.path == path)
            .cloned()
            .collect())
    }

    async fn active_symbol_detail(
        &self,
        path: &str,
        _position: Position,
    ) -> Result<Option<SymbolDetail>> {
        Ok(self
            .active_symbol
            .as_ref()
            .filter(|detail| detail.path == path)
            .cloned())
    }
}
