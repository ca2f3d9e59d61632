use async_trait::async_trait;
use context_indexer::{
    DirEntry, FileScanner, FileStat, FsEvent, MemoryFs, Result, ScanCache, ScanOptions,
    WorkspaceFs,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn paths(files: &[context_protocol::CandidateFile]) -> Vec<&str> {
    files.iter().map(|f| f.path.as_str()).collect()
}

#[tokio::test]
async fn clear_forces_rescan() {
    let fs = Arc::new(MemoryFs::new().with_file("/ws/a.rs", "fn a() {}"));
    let cache = Arc::new(ScanCache::default());
    let scanner = FileScanner::new(fs.clone(), cache.clone());
    let root = Path::new("/ws");
    let cancel = CancellationToken::new();
    let options = ScanOptions::default();

    let first = scanner.scan(root, &options, &cancel).await;
    assert_eq!(paths(&first.files), vec!["a.rs"]);
    assert!(!first.stats.from_cache);

    fs.insert("/ws/b.rs", "fn b() {}");
    let cached = scanner.scan(root, &options, &cancel).await;
    assert!(cached.stats.from_cache);
    assert_eq!(paths(&cached.files), vec!["a.rs"]);

    cache.clear(Some(root));
    let fresh = scanner.scan(root, &options, &cancel).await;
    assert!(!fresh.stats.from_cache);
    assert_eq!(paths(&fresh.files), vec!["a.rs", "b.rs"]);
}

#[tokio::test]
async fn create_and_delete_events_invalidate_without_clear() {
    let fs = Arc::new(MemoryFs::new().with_file("/ws/src/a.rs", ""));
    let cache = Arc::new(ScanCache::default());
    let scanner = FileScanner::new(fs.clone(), cache.clone());
    let root = Path::new("/ws");
    let cancel = CancellationToken::new();
    let options = ScanOptions::default();

    scanner.scan(root, &options, &cancel).await;

    fs.insert("/ws/src/new.rs", "");
    cache.on_fs_event(root, &FsEvent::Created(PathBuf::from("/ws/src/new.rs")));
    let after_create = scanner.scan(root, &options, &cancel).await;
    assert_eq!(paths(&after_create.files), vec!["src/a.rs", "src/new.rs"]);

    fs.remove("/ws/src/a.rs");
    cache.on_fs_event(root, &FsEvent::Deleted(PathBuf::from("/ws/src/a.rs")));
    let after_delete = scanner.scan(root, &options, &cancel).await;
    assert_eq!(paths(&after_delete.files), vec!["src/new.rs"]);
}

#[tokio::test]
async fn disabled_cache_always_rescans() {
    let fs = Arc::new(MemoryFs::new().with_file("/ws/a.rs", ""));
    let cache = Arc::new(ScanCache::default());
    let scanner = FileScanner::new(fs.clone(), cache.clone());
    let mut options = ScanOptions::default();
    options.cache.enabled = false;
    let cancel = CancellationToken::new();

    scanner.scan(Path::new("/ws"), &options, &cancel).await;
    fs.insert("/ws/b.rs", "");
    let second = scanner.scan(Path::new("/ws"), &options, &cancel).await;
    assert_eq!(second.files.len(), 2);
    assert_eq!(cache.stats().size, 0);
}

/// Deletes `/ws/src/gone.rs` and reports it right after `/ws/src` is listed,
/// while the scan is still walking.
struct DeleteDuringScan {
    inner: MemoryFs,
    cache: Arc<ScanCache>,
    fired: AtomicBool,
}

#[async_trait]
impl WorkspaceFs for DeleteDuringScan {
    async fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let entries = self.inner.list_dir(dir).await?;
        if dir == Path::new("/ws/src") && !self.fired.swap(true, Ordering::SeqCst) {
            self.inner.remove("/ws/src/gone.rs");
            self.cache.on_fs_event(
                Path::new("/ws"),
                &FsEvent::Deleted(PathBuf::from("/ws/src/gone.rs")),
            );
        }
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        self.inner.stat(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }
}

#[tokio::test]
async fn delete_during_scan_is_not_cached() {
    let cache = Arc::new(ScanCache::default());
    let fs = Arc::new(DeleteDuringScan {
        inner: MemoryFs::new()
            .with_file("/ws/src/a.rs", "")
            .with_file("/ws/src/gone.rs", ""),
        cache: cache.clone(),
        fired: AtomicBool::new(false),
    });
    let scanner = FileScanner::new(fs, cache.clone());
    let root = Path::new("/ws");
    let cancel = CancellationToken::new();
    let options = ScanOptions::default();

    scanner.scan(root, &options, &cancel).await;
    assert!(cache.get(root).is_none());

    let next = scanner.scan(root, &options, &cancel).await;
    assert!(!next.stats.from_cache);
    assert_eq!(paths(&next.files), vec!["src/a.rs"]);
    assert!(cache.get(root).is_some());
}
