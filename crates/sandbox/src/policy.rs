//! Read-only command policy.
//!
//! A command passes only if the raw string carries none of [`DENY_TOKENS`],
//! every pipeline segment starts with an allow-listed verb, and that verb's
//! own rules accept its arguments.
//!
//! Options are read the way getopt reads them: short flags bundle (`-no` is
//! `-n -o`) and long options may be abbreviated (`--outp` is `--output`).

use crate::error::{Result, SandboxError};
use crate::segment::{split_pipeline, tokenize, unquoted_text, Token};
use once_cell::sync::Lazy;
use regex::Regex;

pub const ALLOWED_COMMANDS: &[&str] = &[
    "ls", "find", "tree", "grep", "rg", "cat", "head", "tail", "wc", "sort", "uniq", "cut", "tr",
    "sed", "awk", "xargs", "git", "file", "stat", "basename", "dirname", "realpath", "du", "echo",
];

pub const GIT_READ_ONLY_SUBCOMMANDS: &[&str] = &[
    "status", "log", "show", "diff", "ls-files", "grep", "blame", "rev-parse", "describe",
    "shortlog", "ls-tree", "cat-file",
];

/// Redirection, backgrounding, chaining and substitution. Checked on the raw
/// string, quoted or not.
pub const DENY_TOKENS: &[&str] = &[">>", ">", "<", "&&", "&", ";", "`", "$("];

/// Parameter expansion and command substitution. Only single quotes keep
/// these away from the shell.
const EXPANSION_CHARS: &[char] = &['$', '`'];

const MAX_NESTING: usize = 4;

static AWK_SYSTEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bsystem\s*\(").expect("valid awk system regex"));
static AWK_GETLINE_PIPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\s*getline\b").expect("valid awk getline regex"));
static AWK_PRINT_PIPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bprintf?\b[^|]*\|\s*(?:"|[A-Za-z_])"#).expect("valid awk print regex"));

pub fn allowed_commands() -> &'static [&'static str] {
    ALLOWED_COMMANDS
}

pub fn is_allowed_command(name: &str) -> bool {
    ALLOWED_COMMANDS.contains(&name)
}

/// Validates a full command line; returns its pipeline segments.
pub fn validate_command(command: &str) -> Result<Vec<String>> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(SandboxError::denied("empty command"));
    }
    if trimmed.contains('\n') || trimmed.contains('\r') {
        return Err(SandboxError::denied("command must be a single line"));
    }
    if let Some(token) = DENY_TOKENS.iter().find(|token| trimmed.contains(*token)) {
        return Err(SandboxError::denied(format!(
            "`{token}` is not allowed (no redirection, chaining or substitution)"
        )));
    }

    let segments = split_pipeline(trimmed)?;
    for segment in &segments {
        validate_segment(segment)?;
    }
    Ok(segments)
}

/// Validates one pipeline segment.
pub fn validate_segment(segment: &str) -> Result<()> {
    let visible = unquoted_text(segment);
    if let Some(ch) = visible.chars().find(|ch| EXPANSION_CHARS.contains(ch)) {
        return Err(SandboxError::denied(format!(
            "`{ch}` expansion is not allowed (use single quotes for literal text)"
        )));
    }
    let tokens = tokenize(segment)?;
    let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    validate_words(&words, &tokens, 0)
}

fn validate_words(words: &[&str], tokens: &[Token], depth: usize) -> Result<()> {
    if depth > MAX_NESTING {
        return Err(SandboxError::denied("command nesting too deep"));
    }
    let Some((&name, args)) = words.split_first() else {
        return Err(SandboxError::denied("empty command"));
    };
    if tokens.first().is_some_and(|t| t.quoted && depth == 0) {
        return Err(SandboxError::denied("command name must not be quoted"));
    }
    if !is_allowed_command(name) {
        return Err(SandboxError::denied(format!(
            "`{name}` is not an allowed command (allowed: {})",
            ALLOWED_COMMANDS.join(", ")
        )));
    }

    match name {
        "git" => check_git(args),
        "sed" => check_sed(args),
        "awk" => check_awk(args),
        "find" => check_find(args, depth),
        "xargs" => check_xargs(args, depth),
        "sort" => deny_write_flags(name, args, &SORT_WRITE_FLAGS),
        "tree" => deny_write_flags(name, args, &TREE_WRITE_FLAGS),
        "rg" => deny_write_flags(name, args, &RG_WRITE_FLAGS),
        "file" => deny_write_flags(name, args, &FILE_WRITE_FLAGS),
        "uniq" => check_uniq(args),
        _ => Ok(()),
    }
}

/// Options of one verb that write files or run programs.
struct WriteFlags {
    short: &'static [char],
    /// Short options whose value is the rest of the cluster.
    short_with_value: &'static [char],
    long: &'static [&'static str],
    /// Real options that only share a prefix with a denied long option.
    long_exempt: &'static [&'static str],
}

impl WriteFlags {
    fn matches(&self, arg: &str) -> bool {
        if self.short.iter().any(|letter| {
            short_cluster_has(arg, *letter, self.short_with_value)
        }) {
            return true;
        }
        let base = arg.split('=').next().unwrap_or(arg);
        !self.long_exempt.contains(&base)
            && self.long.iter().any(|long| long_option_matches(arg, long))
    }
}

const SORT_WRITE_FLAGS: WriteFlags = WriteFlags {
    short: &['o'],
    short_with_value: &['k', 't', 'S', 'T'],
    long: &["--output", "--compress-program"],
    long_exempt: &[],
};

// `-R` reruns tree with `-o 00Tree.html` in every directory.
const TREE_WRITE_FLAGS: WriteFlags = WriteFlags {
    short: &['o', 'R'],
    short_with_value: &[],
    long: &["--output"],
    long_exempt: &[],
};

const RG_WRITE_FLAGS: WriteFlags = WriteFlags {
    short: &[],
    short_with_value: &[],
    long: &["--pre", "--pre-glob"],
    long_exempt: &[],
};

const FILE_WRITE_FLAGS: WriteFlags = WriteFlags {
    short: &['C'],
    short_with_value: &['e', 'F', 'f', 'm', 'P'],
    long: &["--compile"],
    long_exempt: &[],
};

const GIT_WRITE_FLAGS: WriteFlags = WriteFlags {
    short: &[],
    short_with_value: &[],
    long: &[
        "--output",
        "--ext-diff",
        "--textconv",
        "--open-files-in-pager",
    ],
    long_exempt: &["--text"],
};

// `git grep -O` opens matches in a pager command.
const GIT_GREP_WRITE_FLAGS: WriteFlags = WriteFlags {
    short: &['O'],
    short_with_value: &['e', 'f', 'm', 'A', 'B', 'C'],
    ..GIT_WRITE_FLAGS
};

fn deny_write_flags(name: &str, args: &[&str], flags: &WriteFlags) -> Result<()> {
    match args.iter().find(|arg| flags.matches(arg)) {
        Some(arg) => Err(SandboxError::denied(format!(
            "`{name} {arg}` may write files or run programs"
        ))),
        None => Ok(()),
    }
}

/// `arg` names `long` exactly or abbreviates it.
fn long_option_matches(arg: &str, long: &str) -> bool {
    let base = arg.split('=').next().unwrap_or(arg);
    base.len() > 2 && base.starts_with("--") && long.starts_with(base)
}

/// Whether the short cluster `arg` (`-no`) sets `letter`. Scanning stops at
/// the first option in `with_value`.
fn short_cluster_has(arg: &str, letter: char, with_value: &[char]) -> bool {
    let Some(cluster) = arg.strip_prefix('-') else {
        return false;
    };
    if cluster.starts_with('-') {
        return false;
    }
    for ch in cluster.chars() {
        if ch == letter {
            return true;
        }
        if with_value.contains(&ch) {
            return false;
        }
    }
    false
}

fn check_git(args: &[&str]) -> Result<()> {
    let mut iter = args.iter();
    let mut subcommand = None;
    while let Some(arg) = iter.next() {
        match *arg {
            "-C" | "--git-dir" | "--work-tree" => {
                iter.next();
            }
            "-c" | "--exec-path" | "--config-env" => {
                return Err(SandboxError::denied(format!(
                    "git option `{arg}` is not allowed"
                )));
            }
            other if other.starts_with("--exec-path") || other.starts_with("--config-env") => {
                return Err(SandboxError::denied(format!(
                    "git option `{other}` is not allowed"
                )));
            }
            other if other.starts_with('-') => {}
            other => {
                subcommand = Some(other);
                break;
            }
        }
    }
    let Some(subcommand) = subcommand else {
        return Err(SandboxError::denied("git needs a read-only subcommand"));
    };
    if !GIT_READ_ONLY_SUBCOMMANDS.contains(&subcommand) {
        return Err(SandboxError::denied(format!(
            "git {subcommand} is not read-only (allowed: {})",
            GIT_READ_ONLY_SUBCOMMANDS.join(", ")
        )));
    }
    let flags = if subcommand == "grep" {
        &GIT_GREP_WRITE_FLAGS
    } else {
        &GIT_WRITE_FLAGS
    };
    if let Some(arg) = iter.find(|arg| flags.matches(arg)) {
        return Err(SandboxError::denied(format!(
            "git {subcommand} {arg} is not allowed"
        )));
    }
    Ok(())
}

fn check_sed(args: &[&str]) -> Result<()> {
    let mut scripts = Vec::new();
    let mut explicit_script = false;
    let mut operands_only = false;
    let mut iter = args.iter().copied();
    while let Some(arg) = iter.next() {
        if operands_only || arg == "-" || !arg.starts_with('-') {
            if !explicit_script && scripts.is_empty() {
                scripts.push(arg);
            }
            continue;
        }
        if arg == "--" {
            operands_only = true;
            continue;
        }
        if arg.starts_with("--") {
            if long_option_matches(arg, "--in-place") {
                return Err(SandboxError::denied("sed in-place editing is not allowed"));
            }
            if long_option_matches(arg, "--file") {
                return Err(SandboxError::denied("sed script files are not allowed"));
            }
            let value = arg.split_once('=').map(|(_, value)| value);
            if long_option_matches(arg, "--expression") {
                explicit_script = true;
                if let Some(script) = value.or_else(|| iter.next()) {
                    scripts.push(script);
                }
            } else if long_option_matches(arg, "--line-length") && value.is_none() {
                iter.next();
            }
            continue;
        }

        let cluster = &arg[1..];
        for (idx, ch) in cluster.char_indices() {
            let rest = &cluster[idx + ch.len_utf8()..];
            match ch {
                'i' => return Err(SandboxError::denied("sed in-place editing is not allowed")),
                'f' => return Err(SandboxError::denied("sed script files are not allowed")),
                'e' => {
                    explicit_script = true;
                    let script = if rest.is_empty() { iter.next() } else { Some(rest) };
                    if let Some(script) = script {
                        scripts.push(script);
                    }
                    break;
                }
                'l' => {
                    if rest.is_empty() {
                        iter.next();
                    }
                    break;
                }
                _ => {}
            }
        }
    }
    for script in scripts {
        if !sed_script_is_safe(script) {
            return Err(SandboxError::denied(format!(
                "sed script `{script}` executes or writes (e/w commands)"
            )));
        }
    }
    Ok(())
}

/// Rejects the `e`, `w` and `W` commands and the `e`/`w` flags of `s`, both
/// for the whole script and for every piece between braces.
fn sed_script_is_safe(script: &str) -> bool {
    sed_command_is_safe(script)
        && script
            .split(|c| c == '{' || c == '}')
            .all(sed_command_is_safe)
}

fn sed_command_is_safe(script: &str) -> bool {
    let body = strip_sed_address(script.trim());
    let mut chars = body.chars();
    match chars.next() {
        None => true,
        Some('e' | 'w' | 'W') => false,
        Some('{') => sed_command_is_safe(body[1..].trim_end_matches('}')),
        Some('s') => match chars.next() {
            Some(delim) => {
                let rest: String = chars.collect();
                substitution_flags(&rest, delim)
                    .map_or(true, |flags| !flags.contains('e') && !flags.contains('w'))
            }
            None => true,
        },
        Some(_) => true,
    }
}

/// Flags following `pattern<d>replacement<d>`.
fn substitution_flags(rest: &str, delim: char) -> Option<String> {
    let mut seen = 0;
    let mut escaped = false;
    for (idx, ch) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == delim {
            seen += 1;
            if seen == 2 {
                return Some(rest[idx + ch.len_utf8()..].to_string());
            }
        }
    }
    None
}

fn strip_sed_address(script: &str) -> &str {
    let mut rest = script;
    for part in 0..2 {
        rest = rest.trim_start();
        if let Some(stripped) = rest.strip_prefix('$') {
            rest = stripped;
        } else if rest.starts_with(|c: char| c.is_ascii_digit() || c == '+' || c == '~') {
            rest = rest.trim_start_matches(|c: char| c.is_ascii_digit() || c == '+' || c == '~');
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = skip_regex_flags(skip_delimited(stripped, '/'));
        } else if let Some(stripped) = rest.strip_prefix('\\') {
            let mut chars = stripped.chars();
            if let Some(delim) = chars.next() {
                rest = skip_regex_flags(skip_delimited(chars.as_str(), delim));
            }
        }
        if part == 0 {
            match rest.trim_start().strip_prefix(',') {
                Some(stripped) => rest = stripped,
                None => break,
            }
        }
    }
    let rest = rest.trim_start();
    rest.strip_prefix('!').unwrap_or(rest).trim_start()
}

/// `I` and `M` after a regex address.
fn skip_regex_flags(text: &str) -> &str {
    text.trim_start_matches(|c: char| c == 'I' || c == 'M')
}

fn skip_delimited(text: &str, delim: char) -> &str {
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == delim {
            return &text[idx + ch.len_utf8()..];
        }
    }
    ""
}

fn check_awk(args: &[&str]) -> Result<()> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "-f" | "--file" => {
                return Err(SandboxError::denied("awk program files are not allowed"));
            }
            "-v" | "-F" => {
                iter.next();
            }
            other => {
                if AWK_SYSTEM.is_match(other) {
                    return Err(SandboxError::denied("awk system() is not allowed"));
                }
                if AWK_GETLINE_PIPE.is_match(other) {
                    return Err(SandboxError::denied("awk command | getline is not allowed"));
                }
                if AWK_PRINT_PIPE.is_match(other) {
                    return Err(SandboxError::denied(
                        "awk printing to a command is not allowed",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_find(args: &[&str], depth: usize) -> Result<()> {
    let mut idx = 0;
    while idx < args.len() {
        let arg = args[idx];
        match arg {
            "-delete" | "-fls" => {
                return Err(SandboxError::denied(format!("find {arg} is not allowed")));
            }
            other if other.starts_with("-fprint") => {
                return Err(SandboxError::denied(format!("find {other} is not allowed")));
            }
            "-exec" | "-execdir" | "-ok" | "-okdir" => {
                let start = idx + 1;
                let Some(offset) = args[start..]
                    .iter()
                    .position(|word| *word == "+" || *word == ";")
                else {
                    return Err(SandboxError::denied(format!(
                        "find {arg} without a terminator"
                    )));
                };
                let inner: Vec<&str> = args[start..start + offset]
                    .iter()
                    .copied()
                    .filter(|word| *word != "{}")
                    .collect();
                validate_nested(&inner, depth)?;
                idx = start + offset + 1;
                continue;
            }
            _ => {}
        }
        idx += 1;
    }
    Ok(())
}

fn check_xargs(args: &[&str], depth: usize) -> Result<()> {
    const WITH_VALUE: &[&str] = &[
        "-I", "-L", "-n", "-P", "-s", "-d", "-E", "-a", "--max-args", "--max-procs",
        "--delimiter", "--arg-file", "--replace",
    ];
    let mut idx = 0;
    while idx < args.len() {
        let arg = args[idx];
        if !arg.starts_with('-') {
            break;
        }
        idx += if WITH_VALUE.contains(&arg) { 2 } else { 1 };
    }
    let inner: Vec<&str> = args
        .get(idx..)
        .unwrap_or_default()
        .iter()
        .copied()
        .filter(|word| *word != "{}")
        .collect();
    if inner.is_empty() {
        // xargs defaults to echo.
        return Ok(());
    }
    validate_nested(&inner, depth)
}

fn validate_nested(words: &[&str], depth: usize) -> Result<()> {
    validate_words(words, &[], depth + 1)
}

fn check_uniq(args: &[&str]) -> Result<()> {
    let operands = args.iter().filter(|arg| !arg.starts_with('-')).count();
    if operands > 1 {
        return Err(SandboxError::denied("uniq with an output file is not allowed"));
    }
    Ok(())
}
