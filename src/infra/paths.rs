//! Path helpers shared by the parsers, the planner and the analyzers.
//!
//! Planned paths are built lexically under a canonical root, so most of the
//! work here is string-level: separator splitting, traversal checks, and a
//! non-strict canonicalization for paths that do not exist yet.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Separators accepted inside tree names and FILE block paths.
pub const SEPARATORS: [char; 2] = ['/', '\\'];

/// Reasons a relative path is rejected before it is joined onto the root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathSafetyError {
    #[error("path names cannot start with '/' or '\\' (absolute paths not allowed)")]
    Absolute,

    #[error("path traversal with '..' is not allowed")]
    ParentReference,

    #[error("drive letters in paths are not allowed")]
    DriveLetter,
}

/// True if any separator-delimited segment is exactly `..`.
pub fn has_parent_ref(s: &str) -> bool {
    s.split(SEPARATORS).any(|seg| seg == "..")
}

/// True for `X:`-style prefixes.
pub fn has_drive_prefix(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), Some(':')) if c.is_ascii_alphabetic()
    )
}

/// Validate a name or relative path that will be joined under the root.
pub fn check_relative(s: &str) -> Result<(), PathSafetyError> {
    if s.starts_with(SEPARATORS) {
        return Err(PathSafetyError::Absolute);
    }
    if has_parent_ref(s) {
        return Err(PathSafetyError::ParentReference);
    }
    if has_drive_prefix(s) {
        return Err(PathSafetyError::DriveLetter);
    }
    Ok(())
}

/// Non-empty segments of a relative path, `.` dropped.
pub fn segments(rel: &str) -> impl Iterator<Item = &str> {
    rel.split(SEPARATORS)
        .filter(|seg| !seg.is_empty() && *seg != ".")
}

/// Join a relative, already-validated path onto `base` segment by segment,
/// so `a\b` and `a/b` land on the same path on every platform.
pub fn join_relative(base: &Path, rel: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for seg in segments(rel) {
        out.push(seg);
    }
    out
}

/// Number of normal components; used as the creation-order key.
pub fn depth(p: &Path) -> usize {
    p.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Sort paths parents-first: by depth, then lexically.
pub fn sort_by_depth<'a, I>(paths: I) -> Vec<&'a PathBuf>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut out: Vec<&PathBuf> = paths.into_iter().collect();
    out.sort_by(|a, b| depth(a).cmp(&depth(b)).then_with(|| a.cmp(b)));
    out
}

/// Canonicalize the longest existing ancestor and re-append the rest.
/// Works for paths that are only planned and do not exist yet.
pub fn normalize_path(p: &Path) -> PathBuf {
    if let Ok(c) = dunce::canonicalize(p) {
        return c;
    }

    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    let mut cur = p;
    while let Some(parent) = cur.parent() {
        if let Some(name) = cur.file_name() {
            tail.push(name);
        }
        if let Ok(mut c) = dunce::canonicalize(parent) {
            for name in tail.iter().rev() {
                c.push(name);
            }
            return c;
        }
        cur = parent;
    }

    p.to_path_buf()
}

/// Render `p` relative to `root` with forward slashes, for display.
pub fn display_relative(root: &Path, p: &Path) -> String {
    let rel = p.strip_prefix(root).unwrap_or(p);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parent_ref_is_segment_based() {
        assert!(has_parent_ref(".."));
        assert!(has_parent_ref("a/../b"));
        assert!(has_parent_ref("a\\..\\b"));
        assert!(!has_parent_ref("..hidden"));
        assert!(!has_parent_ref("a..b/c"));
    }

    #[test]
    fn check_relative_rejects_unsafe_forms() {
        assert_eq!(check_relative("/etc"), Err(PathSafetyError::Absolute));
        assert_eq!(check_relative("\\x"), Err(PathSafetyError::Absolute));
        assert_eq!(check_relative("a/../b"), Err(PathSafetyError::ParentReference));
        assert_eq!(check_relative("C:stuff"), Err(PathSafetyError::DriveLetter));
        assert_eq!(check_relative("src/main.rs"), Ok(()));
    }

    #[test]
    fn join_relative_accepts_both_separators() {
        let base = Path::new("/r");
        assert_eq!(join_relative(base, "a\\b/c.txt"), PathBuf::from("/r/a/b/c.txt"));
        assert_eq!(join_relative(base, "./a//b"), PathBuf::from("/r/a/b"));
    }

    #[test]
    fn depth_sort_puts_parents_first() {
        let paths = vec![
            PathBuf::from("/r/b/c"),
            PathBuf::from("/r/z"),
            PathBuf::from("/r/a"),
        ];
        let sorted = sort_by_depth(&paths);
        assert_eq!(
            sorted,
            vec![
                &PathBuf::from("/r/a"),
                &PathBuf::from("/r/z"),
                &PathBuf::from("/r/b/c")
            ]
        );
    }

    #[test]
    fn normalize_path_handles_missing_tail() {
        let tmp = TempDir::new().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        let planned = root.join("not").join("yet.txt");
        assert_eq!(normalize_path(&planned), planned);
    }
}
