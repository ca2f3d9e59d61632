use crate::cache::{CacheStats, TtlCache};
use context_protocol::CandidateFile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const DEFAULT_SCAN_CACHE_TTL: Duration = Duration::from_secs(300);
const SCAN_CACHE_CAPACITY: usize = 16;

/// Host-reported mutation of the workspace tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    /// Content change only; the set of paths is unaffected.
    Modified(PathBuf),
}

impl FsEvent {
    /// Whether the event can change which paths exist.
    pub fn alters_path_set(&self) -> bool {
        !matches!(self, Self::Modified(_))
    }

    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Created(path) | Self::Deleted(path) | Self::Modified(path) => {
                vec![path.as_path()]
            }
            Self::Renamed { from, to } => vec![from.as_path(), to.as_path()],
        }
    }
}

/// Full scan results per workspace root.
///
/// Every invalidation bumps a generation counter. A scan records the
/// generation it started under and may only publish while it is unchanged,
/// so events that race a running scan are never lost.
#[derive(Debug)]
pub struct ScanCache {
    entries: TtlCache<Arc<Vec<CandidateFile>>>,
    generations: Mutex<Generations>,
}

#[derive(Debug, Default)]
struct Generations {
    /// Bumped by a full clear.
    epoch: u64,
    per_root: HashMap<String, u64>,
}

impl Generations {
    fn current(&self, key: &str) -> u64 {
        self.epoch + self.per_root.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: String) {
        *self.per_root.entry(key).or_insert(0) += 1;
    }
}

impl Default for ScanCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_CACHE_TTL)
    }
}

impl ScanCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(ttl, SCAN_CACHE_CAPACITY),
            generations: Mutex::new(Generations::default()),
        }
    }

    fn generations(&self) -> MutexGuard<'_, Generations> {
        match self.generations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn key(root: &Path) -> String {
        root.to_string_lossy().into_owned()
    }

    pub fn get(&self, root: &Path) -> Option<Arc<Vec<CandidateFile>>> {
        self.entries.get(&Self::key(root))
    }

    pub fn insert(&self, root: &Path, files: Arc<Vec<CandidateFile>>) {
        self.entries.insert(Self::key(root), files);
    }

    /// Token to pass to [`insert_if_current`](Self::insert_if_current) once
    /// the scan started now finishes.
    pub fn generation(&self, root: &Path) -> u64 {
        self.generations().current(&Self::key(root))
    }

    /// Caches `files` unless `root` was invalidated after `generation` was
    /// taken. Returns whether the entry was stored.
    pub fn insert_if_current(
        &self,
        root: &Path,
        generation: u64,
        files: Arc<Vec<CandidateFile>>,
    ) -> bool {
        let key = Self::key(root);
        let generations = self.generations();
        if generations.current(&key) != generation {
            return false;
        }
        self.entries.insert(key, files);
        true
    }

    /// Synchronously drops the root's entry when the event may have added,
    /// removed or renamed a path. Returns whether anything was invalidated.
    pub fn on_fs_event(&self, root: &Path, event: &FsEvent) -> bool {
        if !event.alters_path_set() {
            return false;
        }
        let inside = event
            .paths()
            .iter()
            .any(|path| path.is_relative() || path.starts_with(root));
        if !inside {
            return false;
        }
        let key = Self::key(root);
        let mut generations = self.generations();
        generations.bump(key.clone());
        let dropped = self.entries.invalidate(&key);
        drop(generations);
        if dropped {
            log::debug!("scan cache invalidated for {} by {event:?}", root.display());
        }
        dropped
    }

    /// `Some(root)` drops one workspace, `None` everything.
    pub fn clear(&self, root: Option<&Path>) {
        let mut generations = self.generations();
        match root {
            Some(root) => {
                let key = Self::key(root);
                generations.bump(key.clone());
                self.entries.invalidate(&key);
            }
            None => {
                generations.epoch += 1;
                self.entries.clear();
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}
