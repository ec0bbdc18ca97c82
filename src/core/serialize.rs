//! Tree text serialization
//!
//! Turns a flat list of slash-separated relative paths (trailing separator
//! marks a directory) back into tree text the parser accepts. Used by the
//! `tree` command to snapshot an existing directory as a starting plan.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::core::tree_text::{ROOT_KEYWORD, SPACES_PER_LEVEL};
use crate::infra::paths::{SEPARATORS, segments};
use crate::infra::walk::FileWalker;

/// One directory or file in the tree being rendered.
#[derive(Debug, Default)]
struct TreeEntry {
    is_dir: bool,
    children: BTreeMap<String, TreeEntry>,
}

impl TreeEntry {
    /// Child `name` as a directory; a file entry of that name is promoted.
    fn dir_mut(&mut self, name: &str) -> &mut TreeEntry {
        let child = self.children.entry(name.to_string()).or_default();
        child.is_dir = true;
        child
    }

    fn insert(&mut self, path: &str) {
        let parts: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = parts.split_last() else {
            return;
        };

        let mut cur = self;
        for part in parents {
            cur = cur.dir_mut(part);
        }

        if path.ends_with(SEPARATORS) {
            cur.dir_mut(last);
        } else {
            cur.children.entry(last.to_string()).or_default();
        }
    }

    fn render(&self, level: usize, out: &mut String) {
        let indent = " ".repeat(SPACES_PER_LEVEL * level);
        let (dirs, files): (Vec<_>, Vec<_>) = self.children.iter().partition(|(_, e)| e.is_dir);

        for (name, entry) in dirs {
            out.push_str(&format!("{indent}{name}/\n"));
            entry.render(level + 1, out);
        }
        for (name, _) in files {
            out.push_str(&format!("{indent}{name}\n"));
        }
    }
}

/// Render `paths` as tree text under `marker`.
///
/// Output is `@ROOT <marker>`, a blank line, `<marker>/`, then one line per
/// entry indented four spaces per level, directories before files, each
/// group sorted, trailing whitespace trimmed.
pub fn render_tree<I, S>(paths: I, marker: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tree = TreeEntry::default();
    for path in paths {
        let path = path.as_ref();
        if !path.is_empty() {
            tree.insert(path);
        }
    }

    let mut body = String::new();
    tree.render(1, &mut body);

    format!("{ROOT_KEYWORD} {marker}\n\n{marker}/\n{}", body.trim_end())
}

/// Walk `root` and render everything under it as tree text.
pub fn tree_from_dir(root: &Path, marker: &str, walker: &FileWalker) -> String {
    let paths: Vec<String> = walker
        .walk_entries(root)
        .into_iter()
        .map(|e| {
            let rel = e
                .rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if e.is_dir { rel + "/" } else { rel }
        })
        .collect();

    debug!(entries = paths.len(), root = %root.display(), "serializing directory");
    render_tree(paths, marker)
}
