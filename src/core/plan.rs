//! Plan model and plan generation
//!
//! `generate_plan` is the single entry point: it parses the tree and the
//! multipatch blocks out of the same buffer, unifies them into absolute
//! planned paths under a canonical root, then annotates every path with its
//! filesystem state and every planned file with duplicate/similarity
//! warnings. It performs no writes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::conflict::analyze_conflicts;
use crate::core::multipatch::{BlockFormatError, PatchBlock, parse_blocks};
use crate::core::similarity::analyze_similarity;
use crate::core::tree_text::{Node, StructuralError, parse_tree_text};
use crate::infra::config::{AnalysisConfig, ConfigError};
use crate::infra::paths::{check_relative, join_relative, normalize_path, segments, sort_by_depth};

/// Filesystem state of one planned path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathState {
    New,
    Exists,
    Overwrite,
    /// A file sits where a directory is planned
    ConflictFile,
    /// A directory sits where a file is planned
    ConflictDir,
}

impl PathState {
    pub fn as_str(self) -> &'static str {
        match self {
            PathState::New => "new",
            PathState::Exists => "exists",
            PathState::Overwrite => "overwrite",
            PathState::ConflictFile => "conflict_file",
            PathState::ConflictDir => "conflict_dir",
        }
    }

    pub fn is_conflict(self) -> bool {
        self.as_str().starts_with("conflict")
    }
}

impl fmt::Display for PathState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An existing file whose name is close to a planned file's name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarMatch {
    pub existing_name: String,
    pub ratio: f64,
    pub paths: Vec<PathBuf>,
}

/// The complete result of one `generate_plan` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    /// Canonical directory standing in for the root marker
    pub root_path: PathBuf,
    pub root_marker: Option<String>,
    /// Tree nodes below the root marker node
    pub nodes: Vec<Node>,
    pub planned_dirs: BTreeSet<PathBuf>,
    pub planned_files: BTreeSet<PathBuf>,
    /// Patch payloads keyed by normalized absolute path
    pub file_contents: BTreeMap<PathBuf, String>,
    pub path_states: BTreeMap<PathBuf, PathState>,
    pub duplicate_warnings: BTreeMap<PathBuf, Vec<PathBuf>>,
    pub similarity_warnings: BTreeMap<PathBuf, Vec<SimilarMatch>>,
    pub errors: Vec<String>,
}

impl Plan {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            ..Default::default()
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.path_states.values().any(|s| s.is_conflict())
    }

    /// No errors and no conflicts: safe to hand to the executor.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.has_conflicts()
    }

    /// Planned directories in creation order.
    pub fn dirs_by_depth(&self) -> Vec<&PathBuf> {
        sort_by_depth(&self.planned_dirs)
    }

    /// Planned files in creation order.
    pub fn files_by_depth(&self) -> Vec<&PathBuf> {
        sort_by_depth(&self.planned_files)
    }

    /// Patch payload for a planned file, if any.
    pub fn content_for(&self, path: &Path) -> Option<&str> {
        self.file_contents
            .get(path)
            .or_else(|| self.file_contents.get(&normalize_path(path)))
            .map(String::as_str)
    }

    pub fn state_of(&self, path: &Path) -> Option<PathState> {
        self.path_states.get(path).copied()
    }

    /// Count planned paths of one kind in a given state.
    pub fn count_state(&self, state: PathState, dirs: bool) -> usize {
        let set = if dirs {
            &self.planned_dirs
        } else {
            &self.planned_files
        };
        set.iter()
            .filter(|p| self.path_states.get(*p) == Some(&state))
            .count()
    }
}

/// Failures that abort plan generation entirely.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    BlockFormat(#[from] BlockFormatError),

    #[error("root directory '{path}' is unreadable: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("root path '{0}' is not a directory")]
    RootNotDirectory(PathBuf),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("invalid scan ignore pattern: {0}")]
    ScanPattern(#[from] globset::Error),
}

/// Directory, file and content sets produced by [`PathPlanBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannedPaths {
    pub dirs: BTreeSet<PathBuf>,
    pub files: BTreeSet<PathBuf>,
    pub contents: BTreeMap<PathBuf, String>,
    pub errors: Vec<StructuralError>,
}

/// Unifies tree nodes and patch blocks into absolute planned paths.
#[derive(Debug)]
pub struct PathPlanBuilder<'a> {
    root: &'a Path,
    out: PlannedPaths,
}

impl<'a> PathPlanBuilder<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self {
            root,
            out: PlannedPaths::default(),
        }
    }

    /// Resolve tree nodes (excluding the root marker node) with an
    /// indentation stack. A misplaced node is reported and skipped so the
    /// remaining nodes still surface their own problems.
    pub fn add_nodes(&mut self, nodes: &[Node]) -> &mut Self {
        let mut stack: Vec<(usize, PathBuf)> = vec![(0, self.root.to_path_buf())];

        for node in nodes {
            while stack.last().is_some_and(|(indent, _)| *indent >= node.indent) {
                stack.pop();
            }

            let Some((parent_indent, parent)) = stack.last() else {
                self.out
                    .errors
                    .push(StructuralError::InvalidIndentation { line: node.line });
                continue;
            };
            if node.indent > parent_indent + 1 {
                self.out
                    .errors
                    .push(StructuralError::InvalidIndentation { line: node.line });
                continue;
            }

            let path = join_relative(parent, &node.name);
            if node.is_dir {
                self.out.dirs.insert(path.clone());
                stack.push((node.indent, path));
            } else {
                self.out.files.insert(path);
            }
        }

        self
    }

    /// Resolve FILE blocks to paths under the root, synthesizing every
    /// intermediate directory.
    pub fn add_blocks(&mut self, blocks: &[PatchBlock]) -> &mut Self {
        for block in blocks {
            if let Err(source) = check_relative(&block.path) {
                self.out.errors.push(StructuralError::UnsafePatchPath {
                    line: block.line,
                    path: block.path.clone(),
                    source,
                });
                continue;
            }

            let segs: Vec<&str> = segments(&block.path).collect();
            let Some((_, ancestors)) = segs.split_last() else {
                self.out
                    .errors
                    .push(StructuralError::EmptyName { line: block.line });
                continue;
            };

            let mut dir = self.root.to_path_buf();
            for seg in ancestors {
                dir.push(seg);
                self.out.dirs.insert(dir.clone());
            }

            let target = join_relative(self.root, &block.path);
            let key = normalize_path(&target);
            if self.out.contents.insert(key, block.content.clone()).is_some() {
                debug!(path = %target.display(), line = block.line, "later FILE block replaces earlier payload");
            }
            self.out.files.insert(target);
        }

        self
    }

    /// Enforce the dir/file exclusivity and the non-empty rule.
    pub fn finish(mut self) -> PlannedPaths {
        let clashes: Vec<PathBuf> = self
            .out
            .dirs
            .intersection(&self.out.files)
            .cloned()
            .collect();
        for path in clashes {
            self.out.files.remove(&path);
            self.out.contents.remove(&normalize_path(&path));
            self.out.errors.push(StructuralError::KindClash {
                path: path.display().to_string(),
            });
        }

        if self.out.dirs.is_empty() && self.out.files.is_empty() && self.out.errors.is_empty() {
            self.out.errors.push(StructuralError::NoStructure);
        }

        self.out
    }
}

/// Canonicalize the caller's root and make sure it is a directory.
fn canonical_root(root_path: &Path) -> Result<PathBuf, PlanError> {
    let root = dunce::canonicalize(root_path).map_err(|source| PlanError::RootUnreadable {
        path: root_path.to_path_buf(),
        source,
    })?;
    if !root.is_dir() {
        return Err(PlanError::RootNotDirectory(root));
    }
    Ok(root)
}

/// Build a plan for `text` against the live filesystem under `root_path`.
///
/// Parse-level problems are collected into `Plan.errors`. Only block
/// structure corruption, an unusable root, or an invalid configuration
/// return `Err`.
#[instrument(skip(text, config), fields(root = %root_path.display()))]
pub fn generate_plan(
    root_path: &Path,
    text: &str,
    config: &AnalysisConfig,
) -> Result<Plan, PlanError> {
    config.validate()?;
    let root = canonical_root(root_path)?;
    let mut plan = Plan::new(root.clone());

    let tree = parse_tree_text(text);
    plan.root_marker = tree.root_marker.clone();
    if let Some(err) = tree.error {
        plan.errors.push(err.to_string());
        return Ok(plan);
    }

    let blocks = parse_blocks(text, tree.root_marker.as_deref())?;
    let nodes: Vec<Node> = tree.nodes.into_iter().skip(1).collect();

    let mut builder = PathPlanBuilder::new(&root);
    builder.add_nodes(&nodes).add_blocks(&blocks);
    let planned = builder.finish();

    plan.nodes = nodes;
    plan.planned_dirs = planned.dirs;
    plan.planned_files = planned.files;
    plan.file_contents = planned.contents;
    plan.errors
        .extend(planned.errors.iter().map(ToString::to_string));

    analyze_conflicts(&mut plan);
    analyze_similarity(&mut plan, config)?;

    debug!(
        dirs = plan.planned_dirs.len(),
        files = plan.planned_files.len(),
        errors = plan.errors.len(),
        "plan generated"
    );
    Ok(plan)
}
