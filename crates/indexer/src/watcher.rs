use crate::error::{IndexerError, Result};
use crate::scan_cache::{FsEvent, ScanCache};
use context_protocol::exclusions::is_excluded_dir;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Keeps the scan cache coherent with on-disk changes under one root.
///
/// Events are applied to the cache on the notify thread, before any listener
/// sees them, so a later scan never serves a result that predates the event.
pub struct ScanWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ScanWatcher {
    pub fn start(
        root: impl AsRef<Path>,
        cache: Arc<ScanCache>,
        listener: Option<mpsc::UnboundedSender<FsEvent>>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let handler_root = root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for fs_event in translate_event(&handler_root, &event) {
                        cache.on_fs_event(&handler_root, &fs_event);
                        if let Some(listener) = &listener {
                            let _ = listener.send(fs_event);
                        }
                    }
                }
                Err(err) => log::warn!("Watcher error: {err}"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| IndexerError::Other(format!("failed to watch {}: {e}", root.display())))?;
        log::debug!("watching {}", root.display());
        Ok(Self {
            root,
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Maps a raw notify event to workspace events, dropping paths inside
/// excluded directories.
pub fn translate_event(root: &Path, event: &Event) -> Vec<FsEvent> {
    let paths: Vec<PathBuf> = event
        .paths
        .iter()
        .filter(|path| is_relevant_path(root, path))
        .cloned()
        .collect();
    if paths.is_empty() {
        return Vec::new();
    }

    match &event.kind {
        EventKind::Create(_) => paths.into_iter().map(FsEvent::Created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(FsEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let mut iter = paths.into_iter();
            match (iter.next(), iter.next()) {
                (Some(from), Some(to)) => vec![FsEvent::Renamed { from, to }],
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(FsEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.into_iter().map(FsEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .into_iter()
            .map(|path| FsEvent::Renamed {
                from: path.clone(),
                to: path,
            })
            .collect(),
        EventKind::Modify(_) => paths.into_iter().map(FsEvent::Modified).collect(),
        _ => Vec::new(),
    }
}

fn is_relevant_path(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    !relative.components().any(|component| match component {
        Component::Normal(name) => is_excluded_dir(&name.to_string_lossy()),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn create_and_remove_map_directly() {
        let root = Path::new("/ws");
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/ws/a.rs".into());
        assert_eq!(
            translate_event(root, &created),
            vec![FsEvent::Created("/ws/a.rs".into())]
        );
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/ws/a.rs".into());
        assert_eq!(
            translate_event(root, &removed),
            vec![FsEvent::Deleted("/ws/a.rs".into())]
        );
    }

    #[test]
    fn rename_both_carries_two_paths() {
        let root = Path::new("/ws");
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/ws/old.rs".into())
            .add_path("/ws/new.rs".into());
        assert_eq!(
            translate_event(root, &event),
            vec![FsEvent::Renamed {
                from: "/ws/old.rs".into(),
                to: "/ws/new.rs".into()
            }]
        );
    }

    #[test]
    fn excluded_dirs_and_content_changes() {
        let root = Path::new("/ws");
        let noisy = Event::new(EventKind::Create(CreateKind::File))
            .add_path("/ws/node_modules/x/index.js".into());
        assert!(translate_event(root, &noisy).is_empty());

        let modified = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path("/ws/src/lib.rs".into());
        assert_eq!(
            translate_event(root, &modified),
            vec![FsEvent::Modified("/ws/src/lib.rs".into())]
        );
    }
}
