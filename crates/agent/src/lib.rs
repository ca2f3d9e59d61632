//! # Context Agent
//!
//! Final file selection. A tool-capable model drives a bounded
//! investigate/finish loop over the command sandbox; a model without tools
//! gets one prompt asking for a JSON array of paths. Every failure path ends
//! in the heuristic shortlist plus the active file.
//!
//! ```text
//! SelectionRequest ──> SelectionCache ──hit──> outcome
//!        │
//!        └─> ModelClient ──investigate──> CommandSandbox ──> transcript ─┐
//!                 ▲                                                      │
//!                 └──────────────────────────────────────────────────────┘
//!                 └─finish──> parse + validate + merge (+ active file)
//! ```

mod cache;
mod controller;
mod error;
mod model;
mod parse;
mod prompt;
mod tools;

pub use cache::{SelectionCache, SelectionKey};
pub use controller::{
    AgentConfig, SelectionController, SelectionOutcome, SelectionRequest, SelectionSource,
};
pub use error::{ModelError, ModelResult};
pub use model::{ModelClient, ModelRequest, ModelResponse, ScriptedModel, TranscriptEntry};
pub use parse::{ensure_active_file, parse_file_reference, parse_text_answer, resolve_selections};
pub use prompt::{render_selection, user_prompt, PromptInput};
pub use tools::{
    tool_specs, AgentToolCall, FinishArgs, InvestigateArgs, ToolSpec, FINISH_TOOL,
    INVESTIGATE_TOOL,
};
