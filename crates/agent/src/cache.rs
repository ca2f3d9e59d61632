use context_indexer::{CacheStats, TtlCache};
use context_protocol::{CandidateFile, FileSelection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const DEFAULT_SELECTION_TTL: Duration = Duration::from_secs(120);
const SELECTION_CACHE_CAPACITY: usize = 128;

/// Everything a selection depends on.
#[derive(Debug, Clone, Copy)]
pub struct SelectionKey<'a> {
    pub root: &'a Path,
    pub request: &'a str,
    pub active_file: Option<&'a str>,
    pub candidates: &'a [CandidateFile],
    pub preselected: &'a [FileSelection],
}

impl SelectionKey<'_> {
    /// `root|hex(blake3(request, active, candidates, preselected))`.
    pub fn render(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hash_field(&mut hasher, self.request.as_bytes());
        hash_field(&mut hasher, self.active_file.unwrap_or_default().as_bytes());
        for candidate in self.candidates {
            hash_field(&mut hasher, candidate.path.as_bytes());
            hasher.update(&candidate.size_bytes.to_le_bytes());
        }
        hasher.update(b"\x00preselected");
        for selection in self.preselected {
            hash_field(&mut hasher, selection.path.as_bytes());
            let (start, end) = selection.bounds().unwrap_or((0, 0));
            hasher.update(&start.to_le_bytes());
            hasher.update(&end.to_le_bytes());
        }
        format!("{}{}", root_prefix(self.root), hasher.finalize().to_hex())
    }
}

fn hash_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn root_prefix(root: &Path) -> String {
    format!("{}|", root.to_string_lossy())
}

/// Memoized selections per workspace root.
///
/// An operation id different from the last one seen for the root starts a
/// fresh operation: the root's entries are dropped before lookup.
#[derive(Debug)]
pub struct SelectionCache {
    entries: TtlCache<Vec<FileSelection>>,
    operations: Mutex<HashMap<String, String>>,
}

impl Default for SelectionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_TTL)
    }
}

impl SelectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(ttl, SELECTION_CACHE_CAPACITY),
            operations: Mutex::new(HashMap::new()),
        }
    }

    /// Drops the root's entries when `recompute` is set or `operation_id`
    /// differs from the previous one. Returns whether the cache may be read.
    pub fn begin(&self, root: &Path, operation_id: Option<&str>, recompute: bool) -> bool {
        let root_key = root.to_string_lossy().into_owned();
        let new_operation = match operation_id {
            Some(id) => {
                let mut operations = self
                    .operations
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let previous = operations.insert(root_key, id.to_string());
                previous.is_some_and(|previous| previous != id)
            }
            None => false,
        };
        if recompute || new_operation {
            let dropped = self.entries.invalidate_prefix(&root_prefix(root));
            log::debug!(
                "selection cache reset for {} ({dropped} entries, recompute={recompute})",
                root.display()
            );
            return false;
        }
        true
    }

    pub fn get(&self, key: &SelectionKey<'_>) -> Option<Vec<FileSelection>> {
        self.entries.get(&key.render())
    }

    pub fn insert(&self, key: &SelectionKey<'_>, selections: Vec<FileSelection>) {
        self.entries.insert(key.render(), selections);
    }

    /// `Some(root)` drops one workspace, `None` everything.
    pub fn clear(&self, root: Option<&Path>) {
        match root {
            Some(root) => {
                self.entries.invalidate_prefix(&root_prefix(root));
            }
            None => {
                self.entries.clear();
                self.operations
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clear();
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}
