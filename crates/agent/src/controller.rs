use crate::cache::{SelectionCache, SelectionKey};
use crate::error::ModelError;
use crate::model::{ModelClient, ModelRequest, ModelResponse, TranscriptEntry};
use crate::parse::{ensure_active_file, parse_text_answer, resolve_selections};
use crate::prompt::{user_prompt, PromptInput, AGENT_SYSTEM_PROMPT, LEGACY_SYSTEM_PROMPT};
use crate::tools::{tool_specs, AgentToolCall};
use context_protocol::budget::truncate_with_marker;
use context_protocol::paths::PathIndex;
use context_protocol::{merge_selections, CandidateFile, FileSelection, StatusSink};
use context_sandbox::CommandSandbox;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// When false, selection is the heuristic shortlist.
    pub enabled: bool,
    pub max_turns: usize,
    /// Investigate output beyond this is cut with a marker.
    pub max_tool_output_chars: usize,
    /// Candidate paths listed in the opening prompt.
    pub manifest_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_turns: 5,
            max_tool_output_chars: 8_000,
            manifest_limit: 400,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub root: PathBuf,
    pub request: String,
    pub active_file: Option<String>,
    /// Current scan; finish paths are validated against it.
    pub candidates: Vec<CandidateFile>,
    /// Heuristic shortlist, also the fallback answer.
    pub preselected: Vec<FileSelection>,
    pub operation_id: Option<String>,
    pub recompute: bool,
}

impl SelectionRequest {
    fn cache_key(&self) -> SelectionKey<'_> {
        SelectionKey {
            root: &self.root,
            request: &self.request,
            active_file: self.active_file.as_deref(),
            candidates: &self.candidates,
            preselected: &self.preselected,
        }
    }

    fn fallback(&self) -> Vec<FileSelection> {
        ensure_active_file(
            merge_selections(self.preselected.iter().cloned()),
            self.active_file.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// `finish` (or a parsable text reply) from the tool loop.
    Agent,
    Legacy,
    Cache,
    /// Heuristic shortlist plus the active file.
    Fallback,
    Cancelled,
}

impl SelectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionSource::Agent => "agent",
            SelectionSource::Legacy => "legacy",
            SelectionSource::Cache => "cache",
            SelectionSource::Fallback => "fallback",
            SelectionSource::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub selections: Vec<FileSelection>,
    pub source: SelectionSource,
    pub transcript: Vec<TranscriptEntry>,
    /// Model invocations made.
    pub turns_used: usize,
}

enum LoopEnd {
    Selected(Vec<FileSelection>),
    Fallback(String),
    Aborted,
}

struct LoopResult {
    end: LoopEnd,
    transcript: Vec<TranscriptEntry>,
    turns_used: usize,
}

/// Chooses the final file set, asking the model when one is configured.
///
/// Never fails: model trouble degrades to the heuristic shortlist.
pub struct SelectionController {
    model: Option<Arc<dyn ModelClient>>,
    sandbox: CommandSandbox,
    cache: Arc<SelectionCache>,
    config: AgentConfig,
    status: Arc<dyn StatusSink>,
}

impl SelectionController {
    pub fn new(
        model: Option<Arc<dyn ModelClient>>,
        sandbox: CommandSandbox,
        cache: Arc<SelectionCache>,
        config: AgentConfig,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            model,
            sandbox,
            cache,
            config,
            status,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SelectionCache> {
        &self.cache
    }

    pub async fn select(
        &self,
        request: &SelectionRequest,
        cancel: &CancellationToken,
    ) -> SelectionOutcome {
        if cancel.is_cancelled() {
            return outcome(request.fallback(), SelectionSource::Cancelled, Vec::new(), 0);
        }

        let model = match &self.model {
            Some(model) if self.config.enabled => Arc::clone(model),
            _ => {
                log::debug!("No selection model configured; using heuristic shortlist");
                return outcome(request.fallback(), SelectionSource::Fallback, Vec::new(), 0);
            }
        };

        let cache_readable =
            self.cache
                .begin(&request.root, request.operation_id.as_deref(), request.recompute);
        let key = request.cache_key();
        if cache_readable {
            if let Some(selections) = self.cache.get(&key) {
                log::debug!("Selection cache hit ({} files)", selections.len());
                return outcome(selections, SelectionSource::Cache, Vec::new(), 0);
            }
        }

        let started = Instant::now();
        let (result, source) = if model.supports_tools() {
            self.status.post_status("Selecting relevant files...", false);
            (
                self.run_agent(model.as_ref(), request, cancel).await,
                SelectionSource::Agent,
            )
        } else {
            self.status
                .post_status("Selecting relevant files (no tool support)...", false);
            (
                self.run_legacy(model.as_ref(), request, cancel).await,
                SelectionSource::Legacy,
            )
        };
        log::debug!(
            "Selection finished after {} turn(s) in {} ms",
            result.turns_used,
            started.elapsed().as_millis()
        );

        match result.end {
            LoopEnd::Selected(selections) => {
                self.cache.insert(&key, selections.clone());
                outcome(selections, source, result.transcript, result.turns_used)
            }
            LoopEnd::Fallback(reason) => {
                log::warn!("File selection fell back to heuristics: {reason}");
                self.status
                    .post_status(&format!("File selection fell back: {reason}"), true);
                outcome(
                    request.fallback(),
                    SelectionSource::Fallback,
                    result.transcript,
                    result.turns_used,
                )
            }
            LoopEnd::Aborted => {
                log::debug!("File selection cancelled");
                outcome(
                    request.fallback(),
                    SelectionSource::Cancelled,
                    result.transcript,
                    result.turns_used,
                )
            }
        }
    }

    async fn run_agent(
        &self,
        model: &dyn ModelClient,
        request: &SelectionRequest,
        cancel: &CancellationToken,
    ) -> LoopResult {
        let known = PathIndex::new(request.candidates.iter().map(|c| c.path.as_str()));
        let tools = tool_specs(self.sandbox.allowed_commands(), self.config.max_turns);
        let mut transcript = vec![
            TranscriptEntry::system(AGENT_SYSTEM_PROMPT),
            TranscriptEntry::user(user_prompt(&self.prompt_input(request))),
        ];
        let max_turns = self.config.max_turns.max(1);
        let mut turns_used = 0;

        let end = loop {
            if turns_used >= max_turns {
                break LoopEnd::Fallback(format!("turn limit of {max_turns} reached"));
            }
            if cancel.is_cancelled() {
                break LoopEnd::Aborted;
            }
            turns_used += 1;
            let response = model
                .generate(
                    ModelRequest {
                        messages: transcript.clone(),
                        tools: tools.clone(),
                    },
                    cancel,
                )
                .await;

            let (name, arguments) = match response {
                Err(ModelError::Cancelled) => break LoopEnd::Aborted,
                Err(err) => break LoopEnd::Fallback(err.to_string()),
                Ok(ModelResponse::Text { content }) => {
                    transcript.push(TranscriptEntry::Assistant {
                        content: content.clone(),
                    });
                    break self.finish_with(&parse_text_answer(&content), &known, request);
                }
                Ok(ModelResponse::ToolCall { name, arguments }) => (name, arguments),
            };
            transcript.push(TranscriptEntry::ToolCall {
                name: name.clone(),
                arguments: arguments.clone(),
            });

            match AgentToolCall::from_raw(&name, &arguments) {
                Err(err) => break LoopEnd::Fallback(err.to_string()),
                Ok(AgentToolCall::Finish { files }) => {
                    break self.finish_with(&files, &known, request);
                }
                Ok(AgentToolCall::Investigate { command }) => {
                    if cancel.is_cancelled() {
                        break LoopEnd::Aborted;
                    }
                    self.status
                        .post_status(&format!("Investigating: {command}"), false);
                    let result = self.sandbox.execute(&command, &request.root).await;
                    // Output produced after cancellation is dropped.
                    if cancel.is_cancelled() {
                        break LoopEnd::Aborted;
                    }
                    let content = match result {
                        Ok(output) => self.clip_tool_output(&output),
                        Err(err) => format!("Error: {err}"),
                    };
                    transcript.push(TranscriptEntry::ToolResult { name, content });
                }
            }
        };

        LoopResult {
            end,
            transcript,
            turns_used,
        }
    }

    async fn run_legacy(
        &self,
        model: &dyn ModelClient,
        request: &SelectionRequest,
        cancel: &CancellationToken,
    ) -> LoopResult {
        let known = PathIndex::new(request.candidates.iter().map(|c| c.path.as_str()));
        let mut transcript = vec![
            TranscriptEntry::system(LEGACY_SYSTEM_PROMPT),
            TranscriptEntry::user(user_prompt(&self.prompt_input(request))),
        ];
        let response = model
            .generate(
                ModelRequest {
                    messages: transcript.clone(),
                    tools: Vec::new(),
                },
                cancel,
            )
            .await;

        let end = match response {
            Err(ModelError::Cancelled) => LoopEnd::Aborted,
            _ if cancel.is_cancelled() => LoopEnd::Aborted,
            Err(err) => LoopEnd::Fallback(err.to_string()),
            Ok(ModelResponse::ToolCall { name, .. }) => {
                LoopEnd::Fallback(format!("unexpected tool call `{name}` without tool support"))
            }
            Ok(ModelResponse::Text { content }) => {
                let paths = parse_text_answer(&content);
                transcript.push(TranscriptEntry::Assistant { content });
                self.finish_with(&paths, &known, request)
            }
        };

        LoopResult {
            end,
            transcript,
            turns_used: 1,
        }
    }

    fn finish_with(&self, raw: &[String], known: &PathIndex, request: &SelectionRequest) -> LoopEnd {
        let selections = resolve_selections(raw, known);
        if selections.is_empty() {
            return LoopEnd::Fallback("model named no known files".to_string());
        }
        LoopEnd::Selected(ensure_active_file(
            selections,
            request.active_file.as_deref(),
        ))
    }

    fn clip_tool_output(&self, output: &str) -> String {
        if output.trim().is_empty() {
            return "(no output)".to_string();
        }
        let clipped = truncate_with_marker(output, self.config.max_tool_output_chars);
        if clipped.truncated {
            log::debug!(
                "Clipped tool output from {} to {} chars",
                clipped.original_chars,
                clipped.kept_chars
            );
        }
        clipped.text
    }

    fn prompt_input<'a>(&self, request: &'a SelectionRequest) -> PromptInput<'a> {
        PromptInput {
            request: &request.request,
            active_file: request.active_file.as_deref(),
            candidates: &request.candidates,
            preselected: &request.preselected,
            manifest_limit: self.config.manifest_limit,
        }
    }
}

fn outcome(
    selections: Vec<FileSelection>,
    source: SelectionSource,
    transcript: Vec<TranscriptEntry>,
    turns_used: usize,
) -> SelectionOutcome {
    SelectionOutcome {
        selections,
        source,
        transcript,
        turns_used,
    }
}
