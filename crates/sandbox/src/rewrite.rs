//! Injects workspace exclusions into recursive listing/search commands.
//!
//! Pure string transformation: the caller decides, once per execution, what
//! the working directory looks like ([`RewriteContext`]). Anything these
//! heuristics cannot classify is returned unchanged.

use crate::segment::{split_pipeline, tokenize, Token};
use context_protocol::exclusions::{BINARY_EXTENSIONS, EXCLUDED_DIRS};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteContext {
    pub in_git_work_tree: bool,
    pub git_available: bool,
}

impl RewriteContext {
    /// Looks for a `.git` entry in `working_dir` or its ancestors and for
    /// `git` on `PATH`. Nothing is executed.
    pub fn detect(working_dir: &Path) -> Self {
        let in_git_work_tree = working_dir
            .ancestors()
            .any(|dir| dir.join(".git").exists());
        Self {
            in_git_work_tree,
            git_available: crate::exec::is_tool_available("git"),
        }
    }
}

/// Rewrites every segment of a pipeline; returns the input on parse failure.
pub fn rewrite_command(command: &str, ctx: &RewriteContext) -> String {
    match split_pipeline(command) {
        Ok(segments) => segments
            .iter()
            .map(|segment| rewrite_segment(segment, ctx))
            .collect::<Vec<_>>()
            .join(" | "),
        Err(_) => command.to_string(),
    }
}

pub fn rewrite_segment(segment: &str, ctx: &RewriteContext) -> String {
    let Ok(tokens) = tokenize(segment) else {
        return segment.to_string();
    };
    let Some(first) = tokens.first() else {
        return segment.to_string();
    };
    match first.text.as_str() {
        "grep" if is_recursive_grep(&tokens[1..]) => {
            insert_after(segment, first.end, &grep_exclusions())
        }
        "rg" => insert_after(segment, first.end, &rg_exclusions()),
        "find" => rewrite_find(segment, &tokens),
        "ls" if is_bare_recursive_ls(&tokens[1..]) && ctx.in_git_work_tree && ctx.git_available => {
            "git ls-files".to_string()
        }
        _ => segment.to_string(),
    }
}

fn insert_after(segment: &str, at: usize, addition: &str) -> String {
    format!("{} {}{}", &segment[..at], addition, &segment[at..])
}

fn has_short_flag(tokens: &[Token], flag: char) -> bool {
    tokens.iter().any(|t| {
        let text = t.text.as_str();
        !t.quoted && text.starts_with('-') && !text.starts_with("--") && text[1..].contains(flag)
    })
}

fn has_long_flag(tokens: &[Token], flags: &[&str]) -> bool {
    tokens
        .iter()
        .any(|t| !t.quoted && flags.contains(&t.text.as_str()))
}

fn is_recursive_grep(args: &[Token]) -> bool {
    has_short_flag(args, 'r')
        || has_short_flag(args, 'R')
        || has_long_flag(args, &["--recursive", "--dereference-recursive"])
}

fn grep_exclusions() -> String {
    let dirs = EXCLUDED_DIRS
        .iter()
        .map(|dir| format!("--exclude-dir={dir}"));
    let exts = BINARY_EXTENSIONS
        .iter()
        .map(|ext| format!("--exclude='*.{ext}'"));
    dirs.chain(exts).collect::<Vec<_>>().join(" ")
}

fn rg_exclusions() -> String {
    let dirs = EXCLUDED_DIRS.iter().map(|dir| format!("--glob '!{dir}'"));
    let exts = BINARY_EXTENSIONS
        .iter()
        .map(|ext| format!("--glob '!*.{ext}'"));
    dirs.chain(exts).collect::<Vec<_>>().join(" ")
}

fn find_exclusions() -> String {
    EXCLUDED_DIRS
        .iter()
        .map(|dir| format!("-not -path '*/{dir}/*'"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_expression_start(token: &Token) -> bool {
    !token.quoted && (token.text.starts_with('-') || token.text == "(" || token.text == "!")
}

/// Predicates go right after the start paths. An expression using `-o` is
/// parenthesized so the exclusions apply to every branch.
fn rewrite_find(segment: &str, tokens: &[Token]) -> String {
    let args = &tokens[1..];
    let paths_end = args
        .iter()
        .position(is_expression_start)
        .unwrap_or(args.len());
    let insert_at = match paths_end {
        0 => tokens[0].end,
        n => args[n - 1].end,
    };
    let expression = &args[paths_end..];
    let has_or = expression
        .iter()
        .any(|t| !t.quoted && (t.text == "-o" || t.text == "-or"));

    let exclusions = find_exclusions();
    if has_or {
        format!(
            "{} {} \\({} \\)",
            &segment[..insert_at],
            exclusions,
            &segment[insert_at..]
        )
    } else {
        insert_after(segment, insert_at, &exclusions)
    }
}

fn is_bare_recursive_ls(args: &[Token]) -> bool {
    let mut recursive = false;
    for token in args {
        match token.text.as_str() {
            "-R" | "--recursive" => recursive = true,
            "." | "./" => {}
            _ => return false,
        }
    }
    recursive
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GIT: RewriteContext = RewriteContext {
        in_git_work_tree: true,
        git_available: true,
    };

    #[test]
    fn recursive_grep_gains_exclusions() {
        let out = rewrite_segment("grep -rn TODO .", &RewriteContext::default());
        assert!(out.starts_with("grep --exclude-dir=.git "));
        assert!(out.contains("--exclude-dir=node_modules"));
        assert!(out.contains("--exclude='*.png'"));
        assert!(out.ends_with(" -rn TODO ."));
    }

    #[test]
    fn plain_grep_is_untouched() {
        assert_eq!(
            rewrite_segment("grep -n TODO src/lib.rs", &GIT),
            "grep -n TODO src/lib.rs"
        );
        assert_eq!(
            rewrite_segment("grep -n '-r' file", &GIT),
            "grep -n '-r' file"
        );
    }

    #[test]
    fn rg_gains_globs() {
        let out = rewrite_segment("rg -l 'fn main'", &GIT);
        assert!(out.starts_with("rg --glob '!.git' "));
        assert!(out.contains("--glob '!*.jpg'"));
        assert!(out.ends_with(" -l 'fn main'"));
    }

    #[test]
    fn find_predicates_follow_start_paths() {
        let out = rewrite_segment("find src lib -name '*.rs'", &GIT);
        assert!(out.starts_with("find src lib -not -path '*/.git/*' "));
        assert!(out.ends_with("-not -path '*/third_party/*' -name '*.rs'"));

        let bare = rewrite_segment("find -type f", &GIT);
        assert!(bare.starts_with("find -not -path"));
    }

    #[test]
    fn find_with_alternation_is_grouped() {
        let out = rewrite_segment("find . -name a -o -name b", &GIT);
        assert!(out.starts_with("find . -not -path '*/.git/*'"));
        assert!(out.ends_with(" \\( -name a -o -name b \\)"));
    }

    #[test]
    fn bare_ls_recursive_uses_git_when_available() {
        assert_eq!(rewrite_segment("ls -R", &GIT), "git ls-files");
        assert_eq!(rewrite_segment("ls -R .", &GIT), "git ls-files");
        assert_eq!(
            rewrite_segment("ls -R", &RewriteContext::default()),
            "ls -R"
        );
        assert_eq!(rewrite_segment("ls -R src", &GIT), "ls -R src");
        assert_eq!(rewrite_segment("ls -la", &GIT), "ls -la");
    }

    #[test]
    fn unknown_commands_and_pipelines() {
        assert_eq!(rewrite_segment("wc -l a.rs", &GIT), "wc -l a.rs");
        let out = rewrite_command("ls -R | wc -l", &GIT);
        assert_eq!(out, "git ls-files | wc -l");
        assert_eq!(rewrite_command("ls 'open", &GIT), "ls 'open");
    }
}
