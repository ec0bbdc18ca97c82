//! Filesystem walker for the existing-file index and the tree serializer.
//! - Extra ignore globs (early directory prune + late file filter)
//! - Gitignore handling is opt-in; by default every file is seen
//! - Hidden files included by default
//! - Deterministic ordering for stable plans and tests
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use tracing::trace;

/// One walked entry, relative to the walk root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WalkEntry
{
    pub rel: PathBuf,
    pub is_dir: bool,
}

/// Walker with optional extra ignore globs.
/// Extra globs are applied in two places:
///   1) Early: prune directories during traversal (filter_entry).
///   2) Late: filter out files that still slipped through.
#[derive(Debug, Clone)]
pub struct FileWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Honor .gitignore/.ignore files; default false
    respect_gitignore: bool,

    /// Include hidden (dot) files; default true
    include_hidden: bool,

    /// Follow symbolic links; default false
    follow_symlinks: bool,

    /// Maximum recursion depth; default None (unbounded)
    max_depth: Option<usize>,
}

impl FileWalker
{
    /// Build a walker with additional ignore patterns (e.g. ".git/**",
    /// "Binaries/**"). Patterns match on paths relative to the walk root.
    pub fn new(additional_ignores: &[String]) -> Result<Self, globset::Error>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            ignore_patterns: builder.build()?,
            respect_gitignore: false,
            include_hidden: true,
            follow_symlinks: false,
            max_depth: None,
        })
    }

    /// (Optional) Honor .gitignore, .git/info/exclude and global gitignore.
    pub fn with_gitignore(
        mut self,
        respect: bool,
    ) -> Self
    {
        self.respect_gitignore = respect;
        self
    }

    /// (Optional) Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    /// (Optional) Follow or skip symbolic links (default false).
    pub fn with_follow_symlinks(
        mut self,
        follow: bool,
    ) -> Self
    {
        self.follow_symlinks = follow;
        self
    }

    /// (Optional) Limit recursion depth (`None` = unbounded).
    pub fn with_max_depth(
        mut self,
        depth: Option<usize>,
    ) -> Self
    {
        self.max_depth = depth;
        self
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) skips dotfiles
        b.hidden(!self.include_hidden);

        b.ignore(self.respect_gitignore);
        b.parents(self.respect_gitignore);
        b.git_ignore(self.respect_gitignore);
        b.git_global(self.respect_gitignore);
        b.git_exclude(self.respect_gitignore);
        // .gitignore outside a repository still counts when asked for
        b.require_git(false);

        b.follow_links(self.follow_symlinks);
        b.max_depth(self.max_depth);

        let extra = self
            .ignore_patterns
            .clone();
        let base = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            if !is_dir
            {
                return true;
            }
            let rel = ent
                .path()
                .strip_prefix(&base)
                .unwrap_or(ent.path());
            // "x/**" also names the directory "x" itself
            let probe = rel.join("_");
            !(extra.is_match(rel) || extra.is_match(&probe))
        });

        b
    }

    /// Files and directories under `root` (root itself excluded), relative
    /// to `root`, sorted.
    pub fn walk_entries<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<WalkEntry>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<WalkEntry> = walker
            .filter_map(|res| match res
            {
                Ok(entry) => Some(entry),
                Err(err) =>
                {
                    trace!(%err, "walk entry skipped");
                    None
                }
            })
            .filter(|entry| entry.depth() > 0)
            .filter_map(|entry| {
                let is_dir = entry
                    .file_type()
                    .is_some_and(|ft| ft.is_dir());
                let rel = entry
                    .path()
                    .strip_prefix(root_path)
                    .ok()?
                    .to_path_buf();
                if !is_dir && self
                    .ignore_patterns
                    .is_match(&rel)
                {
                    return None;
                }
                Some(WalkEntry { rel, is_dir })
            })
            .collect();

        out.sort();
        out
    }

    /// Regular files under `root` as absolute paths, sorted.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        self.walk_entries(root_path)
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| root_path.join(e.rel))
            .collect()
    }

    /// Traverse and then apply a caller-provided filter predicate.
    pub fn walk_with_filter<P, F>(
        &self,
        root: P,
        filter: F,
    ) -> Vec<PathBuf>
    where
        P: AsRef<Path>,
        F: Fn(&Path) -> bool,
    {
        self.walk_files(root)
            .into_iter()
            .filter(|p| filter(p))
            .collect()
    }
}
