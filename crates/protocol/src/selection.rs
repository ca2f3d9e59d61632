use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A file chosen for the prompt, optionally narrowed to a 1-indexed inclusive
/// line range. No range means the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSelection {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

impl FileSelection {
    pub fn whole(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            start_line: None,
            end_line: None,
        }
    }

    /// Range selection; reversed bounds are swapped and line 0 is lifted to 1.
    pub fn range(path: impl Into<String>, start: u32, end: u32) -> Self {
        let (lo, hi) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        Self {
            path: path.into(),
            start_line: Some(lo.max(1)),
            end_line: Some(hi.max(1)),
        }
    }

    pub fn is_whole_file(&self) -> bool {
        self.start_line.is_none() && self.end_line.is_none()
    }

    /// Inclusive bounds, treating a lone start or end as a single line.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        match (self.start_line, self.end_line) {
            (None, None) => None,
            (Some(start), None) => Some((start, start)),
            (None, Some(end)) => Some((end, end)),
            (Some(start), Some(end)) => Some((start.min(end), start.max(end))),
        }
    }

    /// Union with another selection of the same path.
    pub fn absorb(&mut self, other: &FileSelection) {
        match (self.bounds(), other.bounds()) {
            (Some((a_start, a_end)), Some((b_start, b_end))) => {
                self.start_line = Some(a_start.min(b_start));
                self.end_line = Some(a_end.max(b_end));
            }
            _ => {
                self.start_line = None;
                self.end_line = None;
            }
        }
    }
}

/// Collapses selections per path (range union), keeping first-seen order.
pub fn merge_selections(items: impl IntoIterator<Item = FileSelection>) -> Vec<FileSelection> {
    let mut merged: Vec<FileSelection> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for item in items {
        match slots.get(&item.path) {
            Some(&slot) => merged[slot].absorb(&item),
            None => {
                slots.insert(item.path.clone(), merged.len());
                merged.push(item);
            }
        }
    }
    merged
}
