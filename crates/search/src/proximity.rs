//! Directory proximity between two workspace-relative file paths.

use context_protocol::paths::{dir_segments, normalize_rel_path, parent_dir};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectoryProximity {
    pub same_directory: bool,
    /// Candidate directory is the active directory's parent, or a sibling
    /// directory under the same parent.
    pub neighbor: bool,
    /// Leading directory segments both paths have in common.
    pub shared_segments: usize,
}

pub fn directory_proximity(active_path: &str, candidate_path: &str) -> DirectoryProximity {
    let active = normalize_rel_path(active_path);
    let candidate = normalize_rel_path(candidate_path);
    let active_dirs = dir_segments(parent_dir(&active));
    let candidate_dirs = dir_segments(parent_dir(&candidate));

    let shared_segments = active_dirs
        .iter()
        .zip(&candidate_dirs)
        .take_while(|(a, b)| a == b)
        .count();
    let same_directory = active_dirs == candidate_dirs;

    let is_parent = !active_dirs.is_empty()
        && candidate_dirs.len() + 1 == active_dirs.len()
        && shared_segments == candidate_dirs.len();
    let is_sibling = !active_dirs.is_empty()
        && candidate_dirs.len() == active_dirs.len()
        && shared_segments + 1 == active_dirs.len();

    DirectoryProximity {
        same_directory,
        neighbor: !same_directory && (is_parent || is_sibling),
        shared_segments,
    }
}
