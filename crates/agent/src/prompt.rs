use context_protocol::{CandidateFile, FileSelection};
use std::fmt::Write as _;

pub(crate) const AGENT_SYSTEM_PROMPT: &str = "\
You pick the files a coding assistant needs to answer a request about this workspace.
Use `investigate` to run read-only shell commands (grep, find, ls, cat, git log, ...) \
from the workspace root when the manifest alone is not enough.
When you know the answer, call `finish` with workspace-relative paths, each optionally \
followed by a line range (`path:42` or `path:10-80`). Only list paths from the manifest. \
Prefer a few precise files over many loose ones.";

pub(crate) const LEGACY_SYSTEM_PROMPT: &str = "\
You pick the files a coding assistant needs to answer a request about this workspace.
Reply with a JSON array of workspace-relative paths from the manifest, each optionally \
followed by a line range (`path:42` or `path:10-80`), and nothing else.";

/// Inputs rendered into the opening user message.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub request: &'a str,
    pub active_file: Option<&'a str>,
    pub candidates: &'a [CandidateFile],
    pub preselected: &'a [FileSelection],
    /// Manifest lines beyond this are summarized as a count.
    pub manifest_limit: usize,
}

pub fn user_prompt(input: &PromptInput<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Request:\n{}\n", input.request.trim());
    if let Some(active) = input.active_file {
        let _ = writeln!(out, "Active file: {active}\n");
    }
    if !input.preselected.is_empty() {
        out.push_str("Ranked by heuristics:\n");
        for selection in input.preselected {
            let _ = writeln!(out, "- {}", render_selection(selection));
        }
        out.push('\n');
    }

    let _ = writeln!(out, "Workspace manifest ({} files):", input.candidates.len());
    for candidate in input.candidates.iter().take(input.manifest_limit) {
        let _ = writeln!(out, "{}", candidate.path);
    }
    let hidden = input.candidates.len().saturating_sub(input.manifest_limit);
    if hidden > 0 {
        let _ = writeln!(out, "... and {hidden} more (use `investigate` to list them)");
    }
    out
}

pub fn render_selection(selection: &FileSelection) -> String {
    match selection.bounds() {
        Some((start, end)) if start == end => format!("{}:{start}", selection.path),
        Some((start, end)) => format!("{}:{start}-{end}", selection.path),
        None => selection.path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_is_capped() {
        let candidates: Vec<CandidateFile> = (0..5)
            .map(|i| CandidateFile::new(format!("src/f{i}.rs"), format!("/ws/src/f{i}.rs"), 1))
            .collect();
        let preselected = [FileSelection::range("src/f1.rs", 3, 9)];
        let prompt = user_prompt(&PromptInput {
            request: "where is the parser? ",
            active_file: Some("src/f0.rs"),
            candidates: &candidates,
            preselected: &preselected,
            manifest_limit: 3,
        });
        assert!(prompt.starts_with("Request:\nwhere is the parser?\n"));
        assert!(prompt.contains("Active file: src/f0.rs"));
        assert!(prompt.contains("- src/f1.rs:3-9"));
        assert!(prompt.contains("Workspace manifest (5 files):"));
        assert!(prompt.contains("src/f2.rs\n"));
        assert!(!prompt.contains("src/f3.rs"));
        assert!(prompt.contains("... and 2 more"));
    }
}
