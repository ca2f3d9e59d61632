use serde::Serialize;

/// Diagnostics for one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Files accepted into the candidate set
    pub files: usize,

    /// Directories listed
    pub directories: usize,

    /// Entries rejected by ignore rules or the allow-list
    pub skipped_ignored: usize,

    /// Files rejected by the size cap
    pub skipped_size: usize,

    /// Wall time in milliseconds
    pub elapsed_ms: u64,

    /// Per-entry failures (logged and skipped)
    pub errors: Vec<String>,

    /// Result served from the scan cache
    pub from_cache: bool,
}

impl ScanStats {
    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub(crate) fn merge(&mut self, other: ScanStats) {
        self.files += other.files;
        self.directories += other.directories;
        self.skipped_ignored += other.skipped_ignored;
        self.skipped_size += other.skipped_size;
        self.errors.extend(other.errors);
    }
}
