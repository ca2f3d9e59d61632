//! Turning model-written file references into validated selections.

use context_protocol::paths::{normalize_rel_path, PathIndex};
use context_protocol::{merge_selections, FileSelection};
use serde_json::Value;

/// Parses `path`, `path:line`, `path:start-end` or `path#L10-L20`.
///
/// Surrounding quotes, backticks and list bullets are stripped. Reversed
/// ranges are normalized; a suffix that is not a line range stays in the path.
pub fn parse_file_reference(raw: &str) -> Option<FileSelection> {
    let cleaned = raw
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c.is_whitespace())
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | ',' | ' '));
    if cleaned.is_empty() {
        return None;
    }

    if let Some((path, range)) = cleaned.rsplit_once("#L") {
        if let Some((start, end)) = parse_range(&range.replace('L', "")) {
            return selection(path, Some((start, end)));
        }
    }
    if let Some((path, range)) = cleaned.rsplit_once(':') {
        if let Some((start, end)) = parse_range(range) {
            return selection(path, Some((start, end)));
        }
    }
    selection(cleaned, None)
}

fn selection(path: &str, range: Option<(u32, u32)>) -> Option<FileSelection> {
    let path = normalize_rel_path(path);
    if path.is_empty() {
        return None;
    }
    Some(match range {
        Some((start, end)) => FileSelection::range(path, start, end),
        None => FileSelection::whole(path),
    })
}

fn parse_range(raw: &str) -> Option<(u32, u32)> {
    let raw = raw.trim();
    match raw.split_once('-') {
        Some((start, end)) => Some((start.trim().parse().ok()?, end.trim().parse().ok()?)),
        None => {
            let line = raw.parse().ok()?;
            Some((line, line))
        }
    }
}

/// Keeps references that name a known candidate (case-insensitively, with
/// the candidate's casing), merged by path in first-seen order.
pub fn resolve_selections<S: AsRef<str>>(raw: &[S], known: &PathIndex) -> Vec<FileSelection> {
    let mut resolved = Vec::new();
    for item in raw {
        let Some(mut selection) = parse_file_reference(item.as_ref()) else {
            continue;
        };
        match known.resolve(&selection.path) {
            Some(canonical) => {
                selection.path = canonical.to_string();
                resolved.push(selection);
            }
            None => log::debug!("Dropping unknown path from selection: {}", selection.path),
        }
    }
    merge_selections(resolved)
}

/// Appends `active` as a whole-file selection unless already present.
pub fn ensure_active_file(
    selections: Vec<FileSelection>,
    active: Option<&str>,
) -> Vec<FileSelection> {
    let Some(active) = active.filter(|path| !path.is_empty()) else {
        return selections;
    };
    merge_selections(
        selections
            .into_iter()
            .chain(std::iter::once(FileSelection::whole(active))),
    )
}

/// Paths from a free-text answer: the first JSON array of strings, or else
/// one reference per non-empty line.
pub fn parse_text_answer(text: &str) -> Vec<String> {
    if let Some(paths) = first_json_array(text) {
        return paths;
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(' ') || line.starts_with("- "))
        .map(|line| line.trim_start_matches("- ").to_string())
        .collect()
}

fn first_json_array(text: &str) -> Option<Vec<String>> {
    let mut offset = 0;
    while let Some(start) = text[offset..].find('[') {
        let start = offset + start;
        let mut end_search = text.len();
        while let Some(end) = text[start..end_search].rfind(']') {
            let candidate = &text[start..start + end + 1];
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(candidate) {
                let paths: Vec<String> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(path) => Some(path),
                        Value::Object(map) => map
                            .get("path")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect();
                return Some(paths);
            }
            end_search = start + end;
        }
        offset = start + 1;
    }
    None
}
