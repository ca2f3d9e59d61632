//! Assembly-time ordering: which files survive when the budget runs out.

use context_protocol::FileSelection;
use std::collections::BTreeSet;

const ACTIVE_WEIGHT: u32 = 1_000;
const SYMBOL_WEIGHT: u32 = 100;
const DEPENDENCY_WEIGHT: u32 = 10;
const TOPIC_WEIGHT: u32 = 1;

/// Paths that earn a file an earlier slot in the content section.
#[derive(Debug, Clone, Default)]
pub struct OrderingSignals {
    pub active_file: Option<String>,
    pub symbol_paths: BTreeSet<String>,
    /// Direct and reverse dependency edges of the active file.
    pub dependency_paths: BTreeSet<String>,
    /// Files matched to earlier topics of the conversation.
    pub topic_paths: BTreeSet<String>,
}

impl OrderingSignals {
    pub fn weight(&self, path: &str) -> u32 {
        let mut weight = 0;
        if self.active_file.as_deref() == Some(path) {
            weight += ACTIVE_WEIGHT;
        }
        if self.symbol_paths.contains(path) {
            weight += SYMBOL_WEIGHT;
        }
        if self.dependency_paths.contains(path) {
            weight += DEPENDENCY_WEIGHT;
        }
        if self.topic_paths.contains(path) {
            weight += TOPIC_WEIGHT;
        }
        weight
    }
}

/// Highest weight first, ties alphabetical.
pub fn order_selections(
    selections: &[FileSelection],
    signals: &OrderingSignals,
) -> Vec<FileSelection> {
    let mut ordered = selections.to_vec();
    ordered.sort_by(|a, b| {
        signals
            .weight(&b.path)
            .cmp(&signals.weight(&a.path))
            .then_with(|| a.path.cmp(&b.path))
    });
    ordered
}
