//! Filesystem conflict classification
//!
//! Every planned path is checked against the live filesystem, parents
//! before children:
//! - missing → `new`
//! - planned dir over an existing dir → `exists`
//! - planned dir over an existing file → `conflict_file`
//! - planned file over an existing dir → `conflict_dir`
//! - planned file over an existing file → `overwrite` with a payload, else `exists`

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::plan::{PathState, Plan};
use crate::infra::paths::depth;

/// Type mismatch between a planned path and what is on disk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("Conflict: A file exists at '{}' where a directory is planned.", .0.display())]
    FileWhereDirPlanned(PathBuf),

    #[error("Conflict: A directory exists at '{}' where a file is planned.", .0.display())]
    DirWhereFilePlanned(PathBuf),
}

impl ConflictError {
    /// Error for a conflicting state, `None` for the benign ones.
    pub fn from_state(path: &Path, state: PathState) -> Option<Self> {
        match state {
            PathState::ConflictFile => Some(Self::FileWhereDirPlanned(path.to_path_buf())),
            PathState::ConflictDir => Some(Self::DirWhereFilePlanned(path.to_path_buf())),
            _ => None,
        }
    }
}

/// Classify one path. `has_payload` only matters for planned files.
pub fn classify_path(path: &Path, planned_dir: bool, has_payload: bool) -> PathState {
    // metadata follows symlinks, so a link to a directory counts as one
    let Ok(meta) = fs::metadata(path) else {
        return PathState::New;
    };

    match (planned_dir, meta.is_dir()) {
        (true, true) => PathState::Exists,
        (true, false) => PathState::ConflictFile,
        (false, true) => PathState::ConflictDir,
        (false, false) if has_payload => PathState::Overwrite,
        (false, false) => PathState::Exists,
    }
}

/// Fill `plan.path_states` and append one error per conflict.
#[instrument(skip(plan), fields(root = %plan.root_path.display()))]
pub fn analyze_conflicts(plan: &mut Plan) {
    // Directories and files share one parents-first order
    let mut planned: Vec<(&PathBuf, bool)> = plan
        .planned_dirs
        .iter()
        .map(|p| (p, true))
        .chain(plan.planned_files.iter().map(|p| (p, false)))
        .collect();
    planned.sort_by(|(a, _), (b, _)| depth(a).cmp(&depth(b)).then_with(|| a.cmp(b)));

    let states: Vec<(PathBuf, PathState)> = planned
        .into_iter()
        .map(|(path, is_dir)| {
            let has_payload = !is_dir && plan.content_for(path).is_some();
            (path.clone(), classify_path(path, is_dir, has_payload))
        })
        .collect();

    for (path, state) in states {
        if let Some(err) = ConflictError::from_state(&path, state) {
            debug!(path = %path.display(), %state, "conflict");
            plan.errors.push(err.to_string());
        }
        plan.path_states.insert(path, state);
    }
}
