//! # Context Pack
//!
//! Turns the final file selection into one prompt string under a hard
//! character budget.
//!
//! ```text
//! ## File tree        (SectionLimits::max_tree_chars)
//! ## Recent changes   (SectionLimits::max_recent_changes_chars)
//! ## Existing paths   (SectionLimits::max_manifest_chars)
//! ## Symbols          (ContextBudget::max_symbol_chars)
//! ## Symbol at cursor (ContextBudget::max_active_symbol_detail_chars)
//! ## Files            (ContextBudget::max_per_file_chars per file)
//! ```
//!
//! Sections are emitted in that order and every one is also bounded by what
//! is left of `max_total_chars`. Cuts are always marked
//! (`[truncated: N chars -> M chars]`) and the marker counts toward the
//! budget.

mod assembler;
mod content;
mod error;
mod order;
mod sections;
mod summarize;

pub use assembler::{
    AssembledContext, AssemblyInput, ContextAssembler, SectionLimits, TruncationEvent,
};
pub use content::{decode_text, load_text, looks_binary_by_extension, BINARY_PLACEHOLDER};
pub use error::{PackError, Result};
pub use order::{order_selections, OrderingSignals};
pub use sections::{
    render_active_symbol, render_file_tree, render_manifest, render_recent_changes,
    render_symbols, RecentChange, SectionKind,
};
pub use summarize::{is_declaration, omitted_marker, summarize, CONTEXT_LINES};
