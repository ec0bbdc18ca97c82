//! Plan execution
//!
//! Applies a clean plan to disk: directories first, parents before
//! children, then files. Every action yields a tagged [`Outcome`]; the plan
//! itself is never mutated and post-write states come back in the report.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::plan::{PathState, Plan};

/// What happened to one planned path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum Outcome {
    Created,
    Overwritten,
    Skipped,
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Overwritten => "overwritten",
            Outcome::Skipped => "skipped",
            Outcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub path: PathBuf,
    pub is_dir: bool,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    pub dirs_created: usize,
    pub files_created: usize,
    pub files_overwritten: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ApplyStats {
    fn record(&mut self, is_dir: bool, outcome: &Outcome) {
        match (outcome, is_dir) {
            (Outcome::Created, true) => self.dirs_created += 1,
            (Outcome::Created, false) => self.files_created += 1,
            (Outcome::Overwritten, _) => self.files_overwritten += 1,
            (Outcome::Skipped, _) => self.skipped += 1,
            (Outcome::Failed(_), _) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub dry_run: bool,
    pub actions: Vec<Action>,
    pub stats: ApplyStats,
    /// Path states after the run; unchanged on dry-run and for failures
    pub final_states: BTreeMap<PathBuf, PathState>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.stats.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.actions.iter().filter_map(|a| match &a.outcome {
            Outcome::Failed(reason) => Some((a.path.as_path(), reason.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Report would-be outcomes without touching the filesystem
    pub dry_run: bool,
    /// Skip the read-back check after each write
    pub skip_verify: bool,
}

/// Refusals raised before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("plan has {0} conflicting path(s); refusing to apply")]
    Conflicts(usize),

    #[error("plan has {0} error(s); refusing to apply")]
    PlanErrors(usize),
}

/// xxh64 of content with CRLF folded to LF.
pub fn content_hash(s: &str) -> u64 {
    xxhash_rust::xxh64::xxh64(s.replace("\r\n", "\n").as_bytes(), 0)
}

/// Execute `plan`. Refuses plans with conflicts or errors.
#[instrument(skip_all, fields(root = %plan.root_path.display(), dry_run = options.dry_run))]
pub fn execute_plan(plan: &Plan, options: &ApplyOptions) -> Result<ApplyReport, ApplyError> {
    let conflicts = plan.path_states.values().filter(|s| s.is_conflict()).count();
    if conflicts > 0 {
        return Err(ApplyError::Conflicts(conflicts));
    }
    if !plan.errors.is_empty() {
        return Err(ApplyError::PlanErrors(plan.errors.len()));
    }

    let mut report = ApplyReport {
        dry_run: options.dry_run,
        final_states: plan.path_states.clone(),
        ..Default::default()
    };

    for dir in plan.dirs_by_depth() {
        let state = plan.state_of(dir).unwrap_or(PathState::New);
        let outcome = ensure_dir(dir, state, options);
        finish_action(&mut report, dir, true, outcome);
    }

    for file in plan.files_by_depth() {
        let state = plan.state_of(file).unwrap_or(PathState::New);
        let payload = plan.content_for(file).unwrap_or("");
        let outcome = ensure_file(file, state, payload, options);
        finish_action(&mut report, file, false, outcome);
    }

    debug!(?report.stats, "apply finished");
    Ok(report)
}

fn finish_action(report: &mut ApplyReport, path: &Path, is_dir: bool, outcome: Outcome) {
    match &outcome {
        Outcome::Failed(reason) => warn!(path = %path.display(), %reason, "action failed"),
        other => debug!(path = %path.display(), outcome = other.label(), "action"),
    }
    if !report.dry_run && matches!(outcome, Outcome::Created | Outcome::Overwritten) {
        report
            .final_states
            .insert(path.to_path_buf(), PathState::Exists);
    }
    report.stats.record(is_dir, &outcome);
    report.actions.push(Action {
        path: path.to_path_buf(),
        is_dir,
        outcome,
    });
}

fn ensure_dir(path: &Path, state: PathState, options: &ApplyOptions) -> Outcome {
    if state == PathState::Exists || path.is_dir() {
        return Outcome::Skipped;
    }
    if options.dry_run {
        return Outcome::Created;
    }
    match fs::create_dir_all(path) {
        Ok(()) => Outcome::Created,
        Err(e) => Outcome::Failed(format!("mkdir failed: {e}")),
    }
}

fn ensure_file(path: &Path, state: PathState, payload: &str, options: &ApplyOptions) -> Outcome {
    let created = match state {
        PathState::Exists => return Outcome::Skipped,
        PathState::Overwrite => {
            let unchanged = fs::read_to_string(path)
                .map(|existing| content_hash(&existing) == content_hash(payload))
                .unwrap_or(false);
            if unchanged {
                return Outcome::Skipped;
            }
            Outcome::Overwritten
        }
        _ => {
            if path.exists() {
                return Outcome::Skipped;
            }
            Outcome::Created
        }
    };

    if options.dry_run {
        return created;
    }
    if let Err(e) = write_atomic(path, payload.as_bytes()) {
        return Outcome::Failed(format!("write failed: {e:#}"));
    }
    if !options.skip_verify {
        if let Err(e) = verify_written(path, payload) {
            return Outcome::Failed(format!("{e:#}"));
        }
    }
    created
}

/// Read the file back and compare with line endings normalized.
fn verify_written(path: &Path, payload: &str) -> Result<()> {
    let written = fs::read_to_string(path).context("verification read failed")?;
    if content_hash(&written) != content_hash(payload) {
        anyhow::bail!("verification failed: content on disk differs from payload");
    }
    Ok(())
}

/// Write via a temp file in the target directory, then persist over the
/// destination. Existing permissions are carried over.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("create parent {}", dir.display()))?;

    // Temp files start at 0600; new files get the usual 0644
    #[cfg(unix)]
    let perms = Some(
        fs::metadata(path)
            .map(|m| m.permissions())
            .unwrap_or_else(|_| std::os::unix::fs::PermissionsExt::from_mode(0o644)),
    );
    #[cfg(not(unix))]
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = match tempfile::NamedTempFile::new_in(dir) {
        Ok(t) => t,
        Err(_) => tempfile::NamedTempFile::new()?, // fallback to OS temp dir
    };

    let mut file = tmp.as_file();
    file.write_all(data)?;
    file.sync_all()?;

    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    }

    #[cfg(unix)]
    {
        if let Ok(parent_file) = fs::File::open(dir) {
            let _ = parent_file.sync_all();
        }
    }

    if let Err(e) = tmp.persist(path) {
        // Different filesystem: copy instead of rename
        fs::copy(e.file.path(), path).with_context(|| format!("copy to {}", path.display()))?;
    }

    Ok(())
}
