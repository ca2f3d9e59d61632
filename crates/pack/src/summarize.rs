//! Line-level file summarization.
//!
//! Kept: focus ranges padded with [`CONTEXT_LINES`], declaration lines, and
//! the file head when nothing else is in focus. Every other run of lines
//! becomes one `... N lines omitted ...` line.

use context_protocol::budget::char_len;
use once_cell::sync::Lazy;
use regex::Regex;

pub const CONTEXT_LINES: u32 = 3;
const HEAD_LINES: usize = 20;

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:default\s+)?(?:async\s+)?(?:unsafe\s+)?(?:abstract\s+)?(?:fn|struct|enum|trait|impl|mod|type|class|interface|def|function|func|const|static)\b",
    )
    .expect("valid declaration regex")
});

pub fn omitted_marker(lines: usize) -> String {
    format!("... {lines} lines omitted ...")
}

pub fn is_declaration(line: &str) -> bool {
    DECLARATION.is_match(line)
}

/// Collapses `content` around `focus` (1-indexed inclusive line ranges).
///
/// Content within `max_chars` with no focus is returned as-is. The result
/// may still exceed `max_chars`; the caller owns the hard cut.
pub fn summarize(content: &str, focus: &[(u32, u32)], max_chars: usize) -> String {
    if focus.is_empty() && char_len(content) <= max_chars {
        return content.to_string();
    }
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let mut keep = vec![false; lines.len()];
    for &(start, end) in focus {
        let from = start.saturating_sub(CONTEXT_LINES).max(1) as usize - 1;
        let to = (end.saturating_add(CONTEXT_LINES) as usize).min(lines.len());
        for slot in keep.iter_mut().take(to).skip(from) {
            *slot = true;
        }
    }
    for (slot, line) in keep.iter_mut().zip(&lines) {
        if is_declaration(line) {
            *slot = true;
        }
    }
    if focus.is_empty() {
        for slot in keep.iter_mut().take(HEAD_LINES) {
            *slot = true;
        }
    }

    let mut out = Vec::with_capacity(lines.len());
    let mut omitted = 0usize;
    for (line, kept) in lines.iter().zip(&keep) {
        if *kept {
            if omitted > 0 {
                out.push(omitted_marker(omitted));
                omitted = 0;
            }
            out.push((*line).to_string());
        } else {
            omitted += 1;
        }
    }
    if omitted > 0 {
        out.push(omitted_marker(omitted));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn small_file_without_focus_is_verbatim() {
        let text = "fn a() {}\nlet b = 1;\n";
        assert_eq!(summarize(text, &[], 1_000), text);
    }

    #[test]
    fn focus_range_keeps_context_and_collapses_rest() {
        let out = summarize(&numbered(30), &[(10, 12)], 1_000);
        assert_eq!(
            out,
            [
                "... 6 lines omitted ...",
                "line 7",
                "line 8",
                "line 9",
                "line 10",
                "line 11",
                "line 12",
                "line 13",
                "line 14",
                "line 15",
                "... 15 lines omitted ...",
            ]
            .join("\n")
        );
    }

    #[test]
    fn declarations_survive() {
        let mut lines: Vec<String> = (0..40).map(|i| format!("    body {i};")).collect();
        lines[30] = "pub async fn handler() {".to_string();
        let out = summarize(&lines.join("\n"), &[], 100);
        assert!(out.starts_with("    body 0;"));
        assert!(out.contains("... 10 lines omitted ...\npub async fn handler() {"));
        assert!(out.ends_with("... 9 lines omitted ..."));
    }

    #[test]
    fn declaration_shapes() {
        for line in [
            "export default class Foo {",
            "pub(crate) struct Bar;",
            "def run(self):",
            "  function go() {",
            "impl Display for X {",
        ] {
            assert!(is_declaration(line), "{line}");
        }
        assert!(!is_declaration("let functional = 1;"));
    }
}
