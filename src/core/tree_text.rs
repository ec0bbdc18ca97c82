//! Indentation tree parser
//!
//! ```text
//! @ROOT {{Root}}
//!
//! {{Root}}/
//!     NewModule/
//!         NewModule.Build.cs
//! ```
//!
//! - One `@ROOT <marker>` declaration, before any node line
//! - Indent with tabs or groups of 4 spaces; a trailing separator marks a
//!   directory
//! - `#` comments and blank lines are ignored, as is everything inside
//!   multipatch blocks
//! - The first node must be the marker itself, as a directory

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::multipatch::{TagKind, scan_tag};
use crate::infra::paths::{PathSafetyError, SEPARATORS, check_relative, segments};

/// Keyword of the root declaration line.
pub const ROOT_KEYWORD: &str = "@ROOT";

/// Spaces that count as one indentation level.
pub const SPACES_PER_LEVEL: usize = 4;

/// One node line of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub indent: usize,
    pub name: String,
    pub is_dir: bool,
    pub line: usize,
}

/// Problems with the tree structure. Rendered into `Plan.errors`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("Error at line {line}: {source}")]
    UnsafeName {
        line: usize,
        #[source]
        source: PathSafetyError,
    },

    #[error("Error at line {line}: node has an empty name")]
    EmptyName { line: usize },

    #[error("Error at line {line}: malformed root declaration, expected '@ROOT <marker>'")]
    MalformedRoot { line: usize },

    #[error("Error at line {line}: duplicate root declaration (first declared at line {first})")]
    DuplicateRoot { line: usize, first: usize },

    #[error("Error at line {line}: the root declaration must come before any node line")]
    LateRoot { line: usize },

    #[error("Error: tree text must contain an '@ROOT {{{{marker}}}}' line")]
    MissingRoot,

    #[error("Error: the first node in the tree must be the root marker directory '{marker}/'")]
    WrongFirstNode { marker: String },

    #[error("Error at line {line}: indentation level computed as negative")]
    NegativeIndent { line: usize },

    #[error(
        "Structure error at line {line}: invalid indentation, node indented too deeply relative to its parent or missing parent directory"
    )]
    InvalidIndentation { line: usize },

    #[error("Path safety error in FILE block at line {line}: '{path}': {source}")]
    UnsafePatchPath {
        line: usize,
        path: String,
        #[source]
        source: PathSafetyError,
    },

    #[error("Structure error: '{path}' is planned both as a directory and as a file")]
    KindClash { path: String },

    #[error("Error: no structure found (no tree nodes and no FILE blocks)")]
    NoStructure,
}

/// Result of a tree parse. On error `nodes` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeParse {
    pub nodes: Vec<Node>,
    pub root_marker: Option<String>,
    pub error: Option<StructuralError>,
}

impl TreeParse {
    fn failed(root_marker: Option<String>, error: StructuralError) -> Self {
        Self {
            nodes: Vec::new(),
            root_marker,
            error: Some(error),
        }
    }
}

/// Node line before indentation normalization.
struct Candidate<'a> {
    line: usize,
    raw_indent: usize,
    content: &'a str,
}

/// Measure leading indentation: tabs plus whole groups of 4 spaces.
/// Returns the raw level and the trimmed content.
pub fn measure_indent(line: &str) -> (usize, &str) {
    let prefix_len = line
        .bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    let (prefix, rest) = line.split_at(prefix_len);

    let tabs = prefix.bytes().filter(|b| *b == b'\t').count();
    let spaces = prefix_len - tabs;

    (tabs + spaces / SPACES_PER_LEVEL, rest.trim())
}

/// Extract the marker token after `@ROOT`: a bare word, or `{{name}}`.
fn parse_root_marker(rest: &str) -> Option<String> {
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();

    if let Some(inner) = rest.strip_prefix("{{") {
        let end = inner.find("}}")?;
        let name = &inner[..end];
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        return Some(format!("{{{{{name}}}}}"));
    }

    let word: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '{' && *c != '}')
        .collect();
    (!word.is_empty()).then_some(word)
}

/// Parse the tree portion of `text`.
#[instrument(skip(text), fields(len = text.len()))]
pub fn parse_tree_text(text: &str) -> TreeParse {
    let mut root: Option<(String, usize)> = None;
    let mut candidates: Vec<Candidate<'_>> = Vec::new();
    let mut in_block = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();

        if let Some(tag) = scan_tag(trimmed) {
            in_block = tag.kind == TagKind::Begin;
            continue;
        }
        if in_block || trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix(ROOT_KEYWORD) {
            let marker = root.as_ref().map(|(m, _)| m.clone());
            let Some(found) = parse_root_marker(rest) else {
                return TreeParse::failed(marker, StructuralError::MalformedRoot { line: line_no });
            };
            if let Some((_, first)) = &root {
                return TreeParse::failed(
                    marker,
                    StructuralError::DuplicateRoot {
                        line: line_no,
                        first: *first,
                    },
                );
            }
            if !candidates.is_empty() {
                return TreeParse::failed(Some(found), StructuralError::LateRoot { line: line_no });
            }
            root = Some((found, line_no));
            continue;
        }

        let (raw_indent, content) = measure_indent(raw);
        candidates.push(Candidate {
            line: line_no,
            raw_indent,
            content,
        });
    }

    let marker = root.map(|(m, _)| m);

    // Normalize a globally indented block down to level zero
    let min_indent = candidates.iter().map(|c| c.raw_indent).min().unwrap_or(0);
    if min_indent > 0 {
        warn!(min_indent, "tree is globally indented; shifting every node left");
    }

    let mut nodes = Vec::with_capacity(candidates.len());
    for c in &candidates {
        let Some(indent) = c.raw_indent.checked_sub(min_indent) else {
            return TreeParse::failed(marker, StructuralError::NegativeIndent { line: c.line });
        };

        let is_dir = c.content.ends_with(SEPARATORS);
        let name = if is_dir {
            &c.content[..c.content.len() - 1]
        } else {
            c.content
        };

        // "." and "./" name nothing below the parent
        if segments(name).next().is_none() {
            return TreeParse::failed(marker, StructuralError::EmptyName { line: c.line });
        }
        if let Err(source) = check_relative(name) {
            return TreeParse::failed(
                marker,
                StructuralError::UnsafeName {
                    line: c.line,
                    source,
                },
            );
        }

        nodes.push(Node {
            indent,
            name: name.to_string(),
            is_dir,
            line: c.line,
        });
    }

    // Nothing tree-shaped at all: a patch-only payload
    let Some(marker) = marker else {
        if nodes.is_empty() {
            return TreeParse::default();
        }
        return TreeParse::failed(None, StructuralError::MissingRoot);
    };

    match nodes.first() {
        Some(first) if first.name == marker && first.is_dir => {}
        _ => {
            return TreeParse::failed(
                Some(marker.clone()),
                StructuralError::WrongFirstNode { marker },
            );
        }
    }

    debug!(nodes = nodes.len(), %marker, "parsed tree");
    TreeParse {
        nodes,
        root_marker: Some(marker),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(parse: &TreeParse) -> Vec<(usize, &str, bool)> {
        parse
            .nodes
            .iter()
            .map(|n| (n.indent, n.name.as_str(), n.is_dir))
            .collect()
    }

    #[test]
    fn test_basic_tree() {
        let parse = parse_tree_text("@ROOT {{R}}\n\n{{R}}/\n\tFoo/\n\t\tFoo.txt\n");
        assert!(parse.error.is_none(), "{:?}", parse.error);
        assert_eq!(parse.root_marker.as_deref(), Some("{{R}}"));
        assert_eq!(
            names(&parse),
            vec![(0, "{{R}}", true), (1, "Foo", true), (2, "Foo.txt", false)]
        );
        assert_eq!(parse.nodes[2].line, 5);
    }

    #[test]
    fn test_space_indentation_and_comments() {
        let text = "# header\n@ROOT Root\nRoot/\n    src/\n        # note\n        main.rs\n      odd.rs\n";
        let parse = parse_tree_text(text);
        assert!(parse.error.is_none());
        // 6 spaces floor to one level
        assert_eq!(
            names(&parse),
            vec![
                (0, "Root", true),
                (1, "src", true),
                (2, "main.rs", false),
                (1, "odd.rs", false)
            ]
        );
    }

    #[test]
    fn test_global_indent_normalized() {
        let text = "@ROOT {{R}}\n\t{{R}}/\n\t\ta/\n\t\t\tb.txt\n";
        let parse = parse_tree_text(text);
        assert!(parse.error.is_none());
        assert_eq!(parse.nodes[0].indent, 0);
        assert_eq!(parse.nodes[2].indent, 2);
    }

    #[test]
    fn test_block_lines_skipped() {
        let text = "@ROOT {{R}}\n{{R}}/\n\ta.txt\n@@@FILE_BEGIN a.txt\nnot/\n  a node\n@@@FILE_END\n";
        let parse = parse_tree_text(text);
        assert!(parse.error.is_none());
        assert_eq!(parse.nodes.len(), 2);
    }

    #[test]
    fn test_patch_only_text_has_no_error() {
        let parse = parse_tree_text("@@@FILE_BEGIN a.txt\nx\n@@@FILE_END\n");
        assert_eq!(parse, TreeParse::default());
    }

    #[test]
    fn test_missing_root() {
        let parse = parse_tree_text("Root/\n\ta.txt\n");
        assert_eq!(parse.error, Some(StructuralError::MissingRoot));
        assert!(parse.nodes.is_empty());
    }

    #[test]
    fn test_first_node_must_be_marker_dir() {
        let parse = parse_tree_text("@ROOT {{R}}\nOther/\n");
        assert!(matches!(parse.error, Some(StructuralError::WrongFirstNode { .. })));

        let parse = parse_tree_text("@ROOT {{R}}\n{{R}}\n");
        assert!(matches!(parse.error, Some(StructuralError::WrongFirstNode { .. })));

        let parse = parse_tree_text("@ROOT {{R}}\n");
        assert!(matches!(parse.error, Some(StructuralError::WrongFirstNode { .. })));
    }

    #[test]
    fn test_root_declaration_rules() {
        let parse = parse_tree_text("@ROOT\n");
        assert_eq!(parse.error, Some(StructuralError::MalformedRoot { line: 1 }));

        let parse = parse_tree_text("@ROOT a\n@ROOT b\n");
        assert_eq!(
            parse.error,
            Some(StructuralError::DuplicateRoot { line: 2, first: 1 })
        );

        let parse = parse_tree_text("a/\n@ROOT a\n");
        assert_eq!(parse.error, Some(StructuralError::LateRoot { line: 2 }));
    }

    #[test]
    fn test_unsafe_names_rejected() {
        let parse = parse_tree_text("@ROOT R\nR/\n\t../escape/\n");
        assert_eq!(
            parse.error,
            Some(StructuralError::UnsafeName {
                line: 3,
                source: PathSafetyError::ParentReference
            })
        );

        let parse = parse_tree_text("@ROOT R\nR/\n\tC:/x\n");
        assert!(matches!(
            parse.error,
            Some(StructuralError::UnsafeName {
                source: PathSafetyError::DriveLetter,
                ..
            })
        ));

        // A lone separator is a directory with no name
        let parse = parse_tree_text("@ROOT R\nR/\n\t/\n");
        assert_eq!(parse.error, Some(StructuralError::EmptyName { line: 3 }));
    }

    #[test]
    fn test_dot_names_are_empty() {
        let parse = parse_tree_text("@ROOT R\nR/\n    ./\n    a.txt\n");
        assert_eq!(parse.error, Some(StructuralError::EmptyName { line: 3 }));

        let parse = parse_tree_text("@ROOT R\nR/\n    .\n");
        assert_eq!(parse.error, Some(StructuralError::EmptyName { line: 3 }));

        let parse = parse_tree_text("@ROOT R\nR/\n    ././\n");
        assert_eq!(parse.error, Some(StructuralError::EmptyName { line: 3 }));
    }

    #[test]
    fn test_marker_forms() {
        assert_eq!(parse_root_marker(" {{Root}}"), Some("{{Root}}".to_string()));
        assert_eq!(parse_root_marker("\tproj trailing"), Some("proj".to_string()));
        assert_eq!(parse_root_marker("X"), None);
        assert_eq!(parse_root_marker(" {{}}"), None);
    }

    #[test]
    fn test_error_messages_carry_lines() {
        let msg = StructuralError::InvalidIndentation { line: 7 }.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("indented too deeply"));
        assert_eq!(
            StructuralError::MissingRoot.to_string(),
            "Error: tree text must contain an '@ROOT {{marker}}' line"
        );
    }
}
