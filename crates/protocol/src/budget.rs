use serde::{Deserialize, Serialize};

pub const TRUNCATION_MARKER_PREFIX: &str = "[truncated: ";

const DEFAULT_MAX_TOTAL_CHARS: usize = 60_000;
const DEFAULT_MAX_PER_FILE_CHARS: usize = 12_000;
const DEFAULT_MAX_SYMBOL_CHARS: usize = 4_000;
const DEFAULT_MAX_ACTIVE_SYMBOL_DETAIL_CHARS: usize = 3_000;

/// Character ceilings for one assembly run.
///
/// Exceeding any of them is a truncation event, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudget {
    pub max_total_chars: usize,
    pub max_per_file_chars: usize,
    pub max_symbol_chars: usize,
    pub max_active_symbol_detail_chars: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_total_chars: DEFAULT_MAX_TOTAL_CHARS,
            max_per_file_chars: DEFAULT_MAX_PER_FILE_CHARS,
            max_symbol_chars: DEFAULT_MAX_SYMBOL_CHARS,
            max_active_symbol_detail_chars: DEFAULT_MAX_ACTIVE_SYMBOL_DETAIL_CHARS,
        }
    }
}

impl ContextBudget {
    /// Budget with the given total ceiling and default sub-budgets capped by it.
    pub fn with_total(max_total_chars: usize) -> Self {
        let defaults = Self::default();
        Self {
            max_total_chars,
            max_per_file_chars: defaults.max_per_file_chars.min(max_total_chars),
            max_symbol_chars: defaults.max_symbol_chars.min(max_total_chars),
            max_active_symbol_detail_chars: defaults
                .max_active_symbol_detail_chars
                .min(max_total_chars),
        }
    }
}

/// Result of cutting a string down to a character budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated {
    /// Kept content followed by the marker when `truncated` is set.
    pub text: String,
    pub original_chars: usize,
    /// Content characters kept, marker excluded.
    pub kept_chars: usize,
    pub truncated: bool,
}

impl Truncated {
    /// Nothing fit, not even the marker.
    pub fn is_omitted(&self) -> bool {
        self.text.is_empty() && self.original_chars > 0
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Prefix of `text` holding at most `max_chars` characters.
pub fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn truncation_marker(original_chars: usize, kept_chars: usize) -> String {
    format!("\n{TRUNCATION_MARKER_PREFIX}{original_chars} chars -> {kept_chars} chars]\n")
}

/// Cuts `text` so that content plus marker stays within `max_chars`.
///
/// Prefers a line boundary when one exists in the second half of the kept
/// region. When even the bare marker does not fit the result is empty.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> Truncated {
    let original_chars = char_len(text);
    if original_chars <= max_chars {
        return Truncated {
            text: text.to_string(),
            original_chars,
            kept_chars: original_chars,
            truncated: false,
        };
    }

    let widest_marker = char_len(&truncation_marker(original_chars, max_chars));
    let narrowest_marker = char_len(&truncation_marker(original_chars, 0));
    if narrowest_marker > max_chars {
        return Truncated {
            text: String::new(),
            original_chars,
            kept_chars: 0,
            truncated: true,
        };
    }

    let room = max_chars.saturating_sub(widest_marker);
    let mut kept = take_chars(text, room);
    if let Some(newline) = kept.rfind('\n') {
        let at_line = &kept[..newline];
        if char_len(at_line) * 2 >= room {
            kept = at_line;
        }
    }
    let kept_chars = char_len(kept);
    let mut out = String::with_capacity(kept.len() + widest_marker);
    out.push_str(kept);
    out.push_str(&truncation_marker(original_chars, kept_chars));

    Truncated {
        text: out,
        original_chars,
        kept_chars,
        truncated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        let out = truncate_with_marker("hello", 10);
        assert!(!out.truncated);
        assert_eq!(out.text, "hello");
    }

    #[test]
    fn long_text_fits_with_marker() {
        let text = "x".repeat(500);
        for budget in [60usize, 100, 499] {
            let out = truncate_with_marker(&text, budget);
            assert!(out.truncated);
            assert!(char_len(&out.text) <= budget, "budget {budget}");
            assert!(out.text.contains("[truncated: 500 chars -> "));
        }
    }

    #[test]
    fn marker_that_cannot_fit_yields_empty() {
        let out = truncate_with_marker(&"y".repeat(100), 5);
        assert!(out.is_omitted());
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundary() {
        let text = "ж".repeat(300);
        let out = truncate_with_marker(&text, 80);
        assert!(char_len(&out.text) <= 80);
        assert!(out.kept_chars > 0);
    }

    #[test]
    fn with_total_caps_sub_budgets() {
        let budget = ContextBudget::with_total(1_000);
        assert_eq!(budget.max_per_file_chars, 1_000);
        assert_eq!(budget.max_symbol_chars, 1_000);
    }
}
