//! # Context Indexer
//!
//! Candidate discovery for the context pipeline.
//!
//! ## Pipeline
//!
//! ```text
//! Workspace root
//!     │
//!     ├──> IgnoreRules (deny-list + gitignore, checked before any I/O)
//!     │
//!     ├──> FileScanner (semaphore-bounded directory workers over WorkspaceFs)
//!     │      └─> CandidateFile[] (sorted, size-capped, allow-listed)
//!     │
//!     └──> ScanCache (TTL per root, invalidated by FsEvent / ScanWatcher)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use context_indexer::{FileScanner, LocalFs, ScanCache, ScanOptions};
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let scanner = FileScanner::new(Arc::new(LocalFs), Arc::new(ScanCache::default()));
//!     let outcome = scanner
//!         .scan(Path::new("/path/to/project"), &ScanOptions::default(), &CancellationToken::new())
//!         .await;
//!
//!     println!("Found {} files in {} ms", outcome.files.len(), outcome.stats.elapsed_ms);
//! }
//! ```

mod cache;
mod error;
mod fs;
mod ignore_rules;
mod limits;
mod scan_cache;
mod scanner;
mod stats;
mod watcher;

pub use cache::{CacheEntry, CacheEntryStats, CacheStats, TtlCache};
pub use error::{IndexerError, Result};
pub use fs::{DirEntry, EntryKind, FileStat, LocalFs, MemoryFs, WorkspaceFs};
pub use ignore_rules::{gitignore_lines, IgnoreRules};
pub use limits::{clamp_scan_concurrency, scan_concurrency_from_env};
pub use scan_cache::{FsEvent, ScanCache};
pub use scanner::{FileScanner, ScanCacheOptions, ScanOptions, ScanOutcome};
pub use stats::ScanStats;
pub use watcher::{translate_event, ScanWatcher};
