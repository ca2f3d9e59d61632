use context_indexer::{FileScanner, FsEvent, LocalFs, ScanCache, ScanOptions, ScanWatcher};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[cfg_attr(
    not(target_os = "linux"),
    ignore = "watcher latency test is only reliable on Linux"
)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_invalidates_scan_cache_on_create() {
    if std::env::var("SKIP_WATCH_FLOW").is_ok() {
        eprintln!("skipping watch_flow due to SKIP_WATCH_FLOW");
        return;
    }

    let temp = TempDir::new().expect("tempdir");
    let root = temp.path().canonicalize().expect("canonical root");
    tokio::fs::create_dir_all(root.join("src"))
        .await
        .expect("create src");
    tokio::fs::write(root.join("src/lib.rs"), "fn noop() {}\n")
        .await
        .expect("write initial file");

    let cache = Arc::new(ScanCache::default());
    let scanner = FileScanner::new(Arc::new(LocalFs), Arc::clone(&cache));
    let options = ScanOptions::default();
    let cancel = CancellationToken::new();
    let first = scanner.scan(&root, &options, &cancel).await;
    assert_eq!(first.files.len(), 1);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = match ScanWatcher::start(&root, Arc::clone(&cache), Some(tx)) {
        Ok(watcher) => watcher,
        Err(err) => {
            eprintln!("skipping watch_flow: {err}");
            return;
        }
    };
    assert_eq!(watcher.root(), root.as_path());
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::fs::write(root.join("src/new.rs"), "fn added() {}\n")
        .await
        .expect("write new file");

    let created = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            if matches!(&event, FsEvent::Created(path) if path.ends_with("new.rs")) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(created, "no create event within 5s");

    // The cache entry is dropped before listeners hear about the event.
    assert!(cache.get(&root).is_none());
    let second = scanner.scan(&root, &options, &cancel).await;
    assert!(!second.stats.from_cache);
    assert_eq!(second.files.len(), 2);
}
