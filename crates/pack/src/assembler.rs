use crate::content::{load_text, BINARY_PLACEHOLDER};
use crate::error::PackError;
use crate::order::{order_selections, OrderingSignals};
use crate::sections::{
    render_active_symbol, render_file_tree, render_manifest, render_recent_changes,
    render_symbols, RecentChange, SectionKind,
};
use crate::summarize::summarize;
use context_indexer::WorkspaceFs;
use context_protocol::budget::{char_len, truncate_with_marker, ContextBudget};
use context_protocol::{FileSelection, SymbolDetail, SymbolInfo};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const SECTION_SEPARATOR: &str = "\n";

/// Ceilings for sections that have no budget of their own in
/// [`ContextBudget`]. The total budget still applies on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionLimits {
    pub max_tree_chars: usize,
    pub max_recent_changes_chars: usize,
    pub max_manifest_chars: usize,
}

impl Default for SectionLimits {
    fn default() -> Self {
        Self {
            max_tree_chars: 4_000,
            max_recent_changes_chars: 2_000,
            max_manifest_chars: 8_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    pub root: PathBuf,
    /// Final selection; every path must exist under `root`.
    pub selections: Vec<FileSelection>,
    /// Paths known to exist, for the tree and the manifest.
    pub workspace_paths: Vec<String>,
    pub recent_changes: Vec<RecentChange>,
    pub symbols: Vec<SymbolInfo>,
    pub active_symbol: Option<SymbolDetail>,
    pub ordering: OrderingSignals,
}

/// A visible cut made while assembling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TruncationEvent {
    pub section: SectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub original_chars: usize,
    pub kept_chars: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssembledContext {
    pub text: String,
    /// Files that made it into the text, in emission order.
    pub included_paths: Vec<String>,
    /// Files never reached because the total budget ran out.
    pub skipped_for_size: usize,
    pub truncations: Vec<TruncationEvent>,
    /// Sections not emitted for lack of budget.
    pub omitted_sections: Vec<SectionKind>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Running output with total-budget accounting.
struct Writer {
    out: String,
    used: usize,
    max: usize,
}

impl Writer {
    fn new(max: usize) -> Self {
        Self {
            out: String::new(),
            used: 0,
            max,
        }
    }

    fn separator_len(&self) -> usize {
        if self.out.is_empty() {
            0
        } else {
            SECTION_SEPARATOR.len()
        }
    }

    /// Room left for content after the separator the next push would add.
    fn room(&self) -> usize {
        self.max
            .saturating_sub(self.used)
            .saturating_sub(self.separator_len())
    }

    fn is_full(&self) -> bool {
        self.used >= self.max
    }

    fn push_raw(&mut self, text: &str) {
        self.used += char_len(text);
        self.out.push_str(text);
    }

    fn push_block(&mut self, text: &str) {
        if !self.out.is_empty() {
            self.push_raw(SECTION_SEPARATOR);
        }
        self.push_raw(text);
    }
}

/// Builds the final prompt text under a [`ContextBudget`].
pub struct ContextAssembler {
    fs: Arc<dyn WorkspaceFs>,
    limits: SectionLimits,
}

impl ContextAssembler {
    pub fn new(fs: Arc<dyn WorkspaceFs>) -> Self {
        Self {
            fs,
            limits: SectionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SectionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Emits sections in [`SectionKind::ORDER`], stopping once the total
    /// budget is spent. Cancellation returns what was assembled so far.
    pub async fn assemble(
        &self,
        input: &AssemblyInput,
        budget: &ContextBudget,
        cancel: &CancellationToken,
    ) -> AssembledContext {
        let started = Instant::now();
        let mut result = AssembledContext::default();
        let mut writer = Writer::new(budget.max_total_chars);

        for (index, kind) in SectionKind::ORDER.into_iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }
            if writer.is_full() {
                result
                    .omitted_sections
                    .extend_from_slice(&SectionKind::ORDER[index..]);
                if kind == SectionKind::Files {
                    result.skipped_for_size = input.selections.len();
                }
                break;
            }
            if kind == SectionKind::Files {
                self.push_files(input, budget, &mut writer, &mut result, cancel)
                    .await;
                continue;
            }
            let (body, cap) = match kind {
                SectionKind::FileTree => (
                    render_file_tree(&input.workspace_paths),
                    self.limits.max_tree_chars,
                ),
                SectionKind::RecentChanges => (
                    render_recent_changes(&input.recent_changes),
                    self.limits.max_recent_changes_chars,
                ),
                SectionKind::PathManifest => (
                    render_manifest(&input.workspace_paths),
                    self.limits.max_manifest_chars,
                ),
                SectionKind::Symbols => (render_symbols(&input.symbols), budget.max_symbol_chars),
                SectionKind::ActiveSymbol => (
                    input
                        .active_symbol
                        .as_ref()
                        .map(render_active_symbol)
                        .unwrap_or_default(),
                    budget.max_active_symbol_detail_chars,
                ),
                SectionKind::Files => continue,
            };
            if body.is_empty() {
                continue;
            }
            push_section(kind, &body, cap, &mut writer, &mut result);
        }

        result.text = writer.out;
        result.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        log::debug!(
            "Assembled {} chars from {} files ({} skipped, {} truncations) in {} ms",
            char_len(&result.text),
            result.included_paths.len(),
            result.skipped_for_size,
            result.truncations.len(),
            result.elapsed_ms
        );
        result
    }

    async fn push_files(
        &self,
        input: &AssemblyInput,
        budget: &ContextBudget,
        writer: &mut Writer,
        result: &mut AssembledContext,
        cancel: &CancellationToken,
    ) {
        let ordered = order_selections(&input.selections, &input.ordering);
        if ordered.is_empty() {
            return;
        }
        // The header goes out together with the first file that fits.
        let header = format!("## {}\n", SectionKind::Files.title());
        let mut started = false;

        for (index, selection) in ordered.iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                return;
            }
            let Some(block) = self
                .render_file(input, selection, budget.max_per_file_chars, result)
                .await
            else {
                continue;
            };
            let (block, room) = if started {
                (block, writer.max.saturating_sub(writer.used))
            } else {
                (format!("{header}{block}"), writer.room())
            };

            if char_len(&block) <= room {
                push_file_block(writer, &block, started);
                started = true;
                result.included_paths.push(selection.path.clone());
                continue;
            }

            let cut = truncate_with_marker(&block, room);
            let mut unprocessed = ordered.len() - index - 1;
            if cut.is_omitted() {
                unprocessed += 1;
            } else {
                push_file_block(writer, &cut.text, started);
                started = true;
                result.included_paths.push(selection.path.clone());
                result.truncations.push(TruncationEvent {
                    section: SectionKind::Files,
                    path: Some(selection.path.clone()),
                    original_chars: cut.original_chars,
                    kept_chars: cut.kept_chars,
                });
            }
            if !started {
                result.omitted_sections.push(SectionKind::Files);
            }
            result.skipped_for_size = unprocessed;
            log::debug!("Context budget exhausted; {unprocessed} file(s) skipped");
            return;
        }
    }

    /// `### path[:range]` header plus summarized content, or `None` when the
    /// file cannot be read.
    async fn render_file(
        &self,
        input: &AssemblyInput,
        selection: &FileSelection,
        max_per_file: usize,
        result: &mut AssembledContext,
    ) -> Option<String> {
        let header = match selection.bounds() {
            Some((start, end)) => format!("### {} (lines {start}-{end})\n", selection.path),
            None => format!("### {}\n", selection.path),
        };

        let body = match load_text(self.fs.as_ref(), &input.root, &selection.path).await {
            Ok(text) => text,
            Err(PackError::Binary(_)) => return Some(format!("{header}{BINARY_PLACEHOLDER}\n")),
            Err(err) => {
                log::warn!("Skipping file in context: {err}");
                return None;
            }
        };

        let focus: Vec<(u32, u32)> = match selection.bounds() {
            Some(range) => vec![range],
            None if char_len(&body) <= max_per_file => Vec::new(),
            None => symbol_lines(input, &selection.path),
        };
        let summarized = summarize(&body, &focus, max_per_file);
        let cut = truncate_with_marker(&summarized, max_per_file);
        if cut.truncated {
            result.truncations.push(TruncationEvent {
                section: SectionKind::Files,
                path: Some(selection.path.clone()),
                original_chars: cut.original_chars,
                kept_chars: cut.kept_chars,
            });
        }
        let mut block = header;
        block.push_str(cut.text.trim_end_matches('\n'));
        block.push('\n');
        Some(block)
    }
}

fn push_section(
    kind: SectionKind,
    body: &str,
    cap: usize,
    writer: &mut Writer,
    result: &mut AssembledContext,
) {
    let text = format!("## {}\n{}", kind.title(), body);
    let cap = cap.min(writer.room());
    let cut = truncate_with_marker(&text, cap);
    if cut.is_omitted() {
        result.omitted_sections.push(kind);
        return;
    }
    if cut.truncated {
        result.truncations.push(TruncationEvent {
            section: kind,
            path: None,
            original_chars: cut.original_chars,
            kept_chars: cut.kept_chars,
        });
    }
    writer.push_block(&cut.text);
}

fn push_file_block(writer: &mut Writer, block: &str, started: bool) {
    if started {
        writer.push_raw(block);
    } else {
        writer.push_block(block);
    }
}

fn symbol_lines(input: &AssemblyInput, path: &str) -> Vec<(u32, u32)> {
    let mut lines: Vec<(u32, u32)> = input
        .symbols
        .iter()
        .filter(|symbol| symbol.path == path)
        .map(|symbol| (symbol.line, symbol.line))
        .collect();
    if let Some(detail) = input.active_symbol.as_ref().filter(|d| d.path == path) {
        lines.push((detail.line, detail.line));
    }
    lines.sort_unstable();
    lines.dedup();
    lines
}
