//! Quote-aware pipeline splitting and word tokenization (POSIX `sh` subset).

use crate::error::{Result, SandboxError};

/// One shell word with its quotes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Any part of the word was quoted or escaped.
    pub quoted: bool,
    /// Byte span of the raw word inside the segment.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits on `|` outside quotes. Segments are trimmed; an empty segment
/// (from `||`, a leading or a trailing pipe) is denied.
pub fn split_pipeline(command: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    let mut chars = command.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Quote::None, '|') => {
                segments.push(std::mem::take(&mut current));
                continue;
            }
            (Quote::None, '\\') | (Quote::Double, '\\') => {
                current.push(ch);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            (Quote::None, '\'') => quote = Quote::Single,
            (Quote::None, '"') => quote = Quote::Double,
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            _ => {}
        }
        current.push(ch);
    }
    if quote != Quote::None {
        return Err(SandboxError::denied("unterminated quote"));
    }
    segments.push(current);

    let segments: Vec<String> = segments.iter().map(|s| s.trim().to_string()).collect();
    if segments.iter().any(String::is_empty) {
        return Err(SandboxError::denied("empty pipeline segment"));
    }
    Ok(segments)
}

pub fn tokenize(segment: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    let mut quote = Quote::None;
    let mut chars = segment.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if quote == Quote::None && ch.is_whitespace() {
            if let Some(mut token) = current.take() {
                token.end = idx;
                tokens.push(token);
            }
            continue;
        }
        let token = current.get_or_insert_with(|| Token {
            text: String::new(),
            quoted: false,
            start: idx,
            end: idx,
        });
        match (quote, ch) {
            (Quote::None, '\'') => {
                quote = Quote::Single;
                token.quoted = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                token.quoted = true;
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::None, '\\') => {
                token.quoted = true;
                if let Some((_, next)) = chars.next() {
                    token.text.push(next);
                }
            }
            (Quote::Double, '\\') => match chars.peek() {
                Some(&(_, next)) if matches!(next, '"' | '\\' | '$' | '`') => {
                    token.text.push(next);
                    chars.next();
                }
                _ => token.text.push(ch),
            },
            _ => token.text.push(ch),
        }
    }
    if quote != Quote::None {
        return Err(SandboxError::denied("unterminated quote"));
    }
    if let Some(mut token) = current.take() {
        token.end = segment.len();
        tokens.push(token);
    }
    Ok(tokens)
}

/// The parts of `segment` the shell still interprets: unquoted text, plus any
/// `$` or backtick inside double quotes. Single-quoted regions and escaped
/// characters are dropped.
pub fn unquoted_text(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut quote = Quote::None;
    let mut chars = segment.chars();
    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Quote::None, '\'') => quote = Quote::Single,
            (Quote::None, '"') => quote = Quote::Double,
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::None, '\\') => {
                chars.next();
            }
            (Quote::Double, '\\') => {
                chars.next();
            }
            (Quote::Double, '$' | '`') => out.push(ch),
            (Quote::None, _) => out.push(ch),
            _ => {}
        }
    }
    out
}
