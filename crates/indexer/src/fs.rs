//! Filesystem capability consumed by the scanner and the assembler.
//!
//! The pipeline only ever lists, stats and reads. Hosts provide those three
//! operations through [`WorkspaceFs`]; [`LocalFs`] serves a real directory and
//! [`MemoryFs`] an in-memory tree.

use crate::error::{IndexerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Links to directories are reported as-is and never followed.
    Symlink,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub kind: EntryKind,
}

#[async_trait]
pub trait WorkspaceFs: Send + Sync {
    async fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntry>>;
    async fn stat(&self, path: &Path) -> Result<FileStat>;
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Local disk via `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

#[async_trait]
impl WorkspaceFs for LocalFs {
    async fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = match entry.file_type().await {
                Ok(ft) if ft.is_dir() => EntryKind::Directory,
                Ok(ft) if ft.is_file() => EntryKind::File,
                Ok(ft) if ft.is_symlink() => match tokio::fs::metadata(entry.path()).await {
                    Ok(meta) if meta.is_file() => EntryKind::File,
                    _ => EntryKind::Symlink,
                },
                Ok(_) => EntryKind::Other,
                Err(err) => {
                    log::warn!("Cannot read file type of {}: {err}", entry.path().display());
                    continue;
                }
            };
            entries.push(DirEntry { name, kind });
        }
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let meta = tokio::fs::metadata(path).await?;
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Ok(FileStat {
            size: meta.len(),
            kind,
        })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    failing: HashSet<PathBuf>,
}

/// In-memory tree addressed by absolute-looking paths (`/ws/src/lib.rs`).
///
/// Mutations are visible to in-flight scans, which makes it suitable for
/// simulating a user editing the tree during a pipeline run.
#[derive(Debug, Default)]
pub struct MemoryFs {
    tree: RwLock<MemoryTree>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a file (parents are created implicitly).
    pub fn with_file(self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = clean(path.as_ref());
        let mut tree = self.write();
        let mut parent = path.parent();
        while let Some(dir) = parent {
            tree.dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
        tree.files.insert(path, content.into());
    }

    pub fn mkdir(&self, path: impl AsRef<Path>) {
        let path = clean(path.as_ref());
        let mut tree = self.write();
        let mut current = Some(path.as_path());
        while let Some(dir) = current {
            tree.dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let path = clean(path.as_ref());
        self.write().files.remove(&path).is_some()
    }

    /// Every later list/stat/read on `path` fails with a permission error.
    pub fn fail_on(&self, path: impl AsRef<Path>) {
        let path = clean(path.as_ref());
        self.write().failing.insert(path);
    }

    fn read_tree(&self) -> RwLockReadGuard<'_, MemoryTree> {
        self.tree.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryTree> {
        self.tree
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failing(tree: &MemoryTree, path: &Path) -> Result<()> {
        if tree.failing.contains(path) {
            return Err(IndexerError::IoError(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkspaceFs for MemoryFs {
    async fn list_dir(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let dir = clean(dir);
        let tree = self.read_tree();
        Self::check_failing(&tree, &dir)?;
        if !tree.dirs.contains(&dir) {
            return Err(IndexerError::NotFound(dir.display().to_string()));
        }

        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();
        for file in tree.files.keys() {
            if file.parent() == Some(dir.as_path()) {
                if let Some(name) = file.file_name() {
                    children.insert(name.to_string_lossy().into_owned(), EntryKind::File);
                }
            }
        }
        for sub in &tree.dirs {
            if sub.parent() == Some(dir.as_path()) {
                if let Some(name) = sub.file_name() {
                    children.insert(name.to_string_lossy().into_owned(), EntryKind::Directory);
                }
            }
        }

        Ok(children
            .into_iter()
            .map(|(name, kind)| DirEntry { name, kind })
            .collect())
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let path = clean(path);
        let tree = self.read_tree();
        Self::check_failing(&tree, &path)?;
        if let Some(content) = tree.files.get(&path) {
            return Ok(FileStat {
                size: content.len() as u64,
                kind: EntryKind::File,
            });
        }
        if tree.dirs.contains(&path) {
            return Ok(FileStat {
                size: 0,
                kind: EntryKind::Directory,
            });
        }
        Err(IndexerError::NotFound(path.display().to_string()))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = clean(path);
        let tree = self.read_tree();
        Self::check_failing(&tree, &path)?;
        tree.files
            .get(&path)
            .cloned()
            .ok_or_else(|| IndexerError::NotFound(path.display().to_string()))
    }
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn memory_fs_lists_immediate_children() {
        let fs = MemoryFs::new()
            .with_file("/ws/src/lib.rs", "fn a() {}")
            .with_file("/ws/src/nested/mod.rs", "")
            .with_file("/ws/README.md", "# hi");

        let root = fs.list_dir(Path::new("/ws")).await.unwrap();
        assert_eq!(
            root,
            vec![
                DirEntry {
                    name: "README.md".into(),
                    kind: EntryKind::File
                },
                DirEntry {
                    name: "src".into(),
                    kind: EntryKind::Directory
                },
            ]
        );

        let stat = fs.stat(Path::new("/ws/src/lib.rs")).await.unwrap();
        assert_eq!(stat.size, 9);
    }

    #[tokio::test]
    async fn memory_fs_failures_are_io_errors() {
        let fs = MemoryFs::new().with_file("/ws/a.rs", "");
        fs.fail_on("/ws/a.rs");
        assert!(fs.stat(Path::new("/ws/a.rs")).await.is_err());
        assert!(fs.list_dir(Path::new("/ws/missing")).await.is_err());
    }

    #[tokio::test]
    async fn local_fs_reads_tempdir() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"abc").unwrap();
        let entries = LocalFs.list_dir(temp.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::File);
        let bytes = LocalFs.read(&temp.path().join("a.txt")).await.unwrap();
        assert_eq!(bytes, b"abc");
    }
}
