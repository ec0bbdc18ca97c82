//! Multipatch block parser
//!
//! Recognizes tagged regions of the form:
//!
//! ```text
//! @@@FILE_BEGIN path/to/file.txt
//! literal contents
//! @@@FILE_END
//! ```
//!
//! - Tags are `@@@<KEYWORD>_BEGIN` / `@@@<KEYWORD>_END`, keyword in `[A-Z_]+`
//! - Every keyword must balance; blocks never nest
//! - Only `FILE` blocks produce output, `COMMENT` and unknown keywords are
//!   validated and dropped
//! - Single pass over lines with an explicit state machine, no regex

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::infra::paths::{SEPARATORS, segments};

/// Marker every tag starts with.
pub const TAG_PREFIX: &str = "@@@";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Begin,
    End,
}

/// A BEGIN or END tag recognized on a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub keyword: &'a str,
    pub kind: TagKind,
    /// Text after the tag on the same line (inline path for BEGIN).
    pub header: &'a str,
}

/// What a keyword does once its block is balanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Extracted as a (path, content) pair
    File,
    /// Recognized, discarded
    Comment,
    /// Unrecognized, discarded
    Other,
}

impl BlockKind {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "FILE" => BlockKind::File,
            "COMMENT" => BlockKind::Comment,
            _ => BlockKind::Other,
        }
    }

    pub fn produces_output(self) -> bool {
        matches!(self, BlockKind::File)
    }
}

/// A parsed FILE block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchBlock {
    /// Relative path, root marker already stripped
    pub path: String,
    /// Raw text between the BEGIN line and the END tag
    pub content: String,
    /// 1-based line of the BEGIN tag
    pub line: usize,
}

/// A balanced block of any keyword, before path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock<'a> {
    pub keyword: &'a str,
    pub start_line: usize,
    pub end_line: usize,
    pub header: &'a str,
    pub body: String,
}

/// Structural corruption of the block payload. Any of these makes the whole
/// payload untrustworthy, so extraction stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum BlockFormatError {
    #[error(
        "Parsing Error: nested block detected. Block '{keyword}' at line {line} began before block '{open_keyword}' from line {open_line} was closed"
    )]
    #[diagnostic(
        code(multipatch::nested),
        help("blocks never nest; close the open block with its END tag first")
    )]
    Nested {
        keyword: String,
        line: usize,
        open_keyword: String,
        open_line: usize,
    },

    #[error("Parsing Error: unexpected '@@@{keyword}_END' at line {line} with no open block")]
    #[diagnostic(
        code(multipatch::unexpected_end),
        help("remove the stray END tag or add the matching BEGIN tag above it")
    )]
    UnexpectedEnd { keyword: String, line: usize },

    #[error(
        "Parsing Error: mismatched block tags. Expected '@@@{expected}_END' but found '@@@{found}_END' at line {line}"
    )]
    #[diagnostic(
        code(multipatch::mismatched),
        help("END tags must repeat the keyword of the open BEGIN tag")
    )]
    Mismatched {
        expected: String,
        found: String,
        line: usize,
    },

    #[error("Parsing Error: block '{keyword}' began at line {line} but was never closed")]
    #[diagnostic(code(multipatch::unclosed), help("add the matching END tag"))]
    Unclosed { keyword: String, line: usize },

    #[error("Parsing Error: FILE_BEGIN block at line {line} has no path defined")]
    #[diagnostic(
        code(multipatch::empty_path),
        help("put the path after the BEGIN tag or on the first line of the block")
    )]
    EmptyPath { line: usize },
}

impl BlockFormatError {
    /// Source line of the offending tag.
    pub fn line(&self) -> usize {
        match self {
            BlockFormatError::Nested { line, .. }
            | BlockFormatError::UnexpectedEnd { line, .. }
            | BlockFormatError::Mismatched { line, .. }
            | BlockFormatError::Unclosed { line, .. }
            | BlockFormatError::EmptyPath { line } => *line,
        }
    }
}

/// Recognize a tag at the start of `line` (leading whitespace allowed).
///
/// The keyword is the longest `[A-Z_]` run after `@@@`, minus its
/// `_BEGIN`/`_END` suffix. Anything after the run is the header.
pub fn scan_tag(line: &str) -> Option<Tag<'_>> {
    let rest = line.trim_start().strip_prefix(TAG_PREFIX)?;
    let run_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_uppercase() || *b == b'_')
        .count();
    let (run, header) = rest.split_at(run_len);

    if let Some(keyword) = run.strip_suffix("_BEGIN") {
        if !keyword.is_empty() {
            return Some(Tag {
                keyword,
                kind: TagKind::Begin,
                header,
            });
        }
    }
    if let Some(keyword) = run.strip_suffix("_END") {
        if !keyword.is_empty() {
            return Some(Tag {
                keyword,
                kind: TagKind::End,
                header,
            });
        }
    }
    None
}

/// Parser state: outside any block, or accumulating one.
#[derive(Debug)]
enum ParseState<'a> {
    Outside,
    Inside {
        keyword: &'a str,
        start_line: usize,
        header: &'a str,
        body: String,
    },
}

/// Validate BEGIN/END structure for every keyword and return all balanced
/// blocks in source order.
pub fn scan_blocks(text: &str) -> Result<Vec<RawBlock<'_>>, BlockFormatError> {
    let mut blocks = Vec::new();
    let mut state = ParseState::Outside;

    for (idx, raw_line) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let tag = scan_tag(raw_line.trim_end_matches(['\n', '\r']));

        state = match (state, tag) {
            (ParseState::Outside, None) => ParseState::Outside,

            (ParseState::Outside, Some(tag)) if tag.kind == TagKind::Begin => {
                trace!(keyword = tag.keyword, line = line_no, "block begin");
                ParseState::Inside {
                    keyword: tag.keyword,
                    start_line: line_no,
                    header: tag.header,
                    body: String::new(),
                }
            }

            (ParseState::Outside, Some(tag)) => {
                return Err(BlockFormatError::UnexpectedEnd {
                    keyword: tag.keyword.to_string(),
                    line: line_no,
                });
            }

            (
                ParseState::Inside {
                    keyword,
                    start_line,
                    header,
                    mut body,
                },
                None,
            ) => {
                body.push_str(raw_line);
                ParseState::Inside {
                    keyword,
                    start_line,
                    header,
                    body,
                }
            }

            (
                ParseState::Inside {
                    keyword,
                    start_line,
                    ..
                },
                Some(tag),
            ) if tag.kind == TagKind::Begin => {
                return Err(BlockFormatError::Nested {
                    keyword: tag.keyword.to_string(),
                    line: line_no,
                    open_keyword: keyword.to_string(),
                    open_line: start_line,
                });
            }

            (
                ParseState::Inside {
                    keyword,
                    start_line,
                    header,
                    body,
                },
                Some(tag),
            ) => {
                if tag.keyword != keyword {
                    return Err(BlockFormatError::Mismatched {
                        expected: keyword.to_string(),
                        found: tag.keyword.to_string(),
                        line: line_no,
                    });
                }
                trace!(keyword, start_line, end_line = line_no, "block end");
                blocks.push(RawBlock {
                    keyword,
                    start_line,
                    end_line: line_no,
                    header,
                    body,
                });
                ParseState::Outside
            }
        };
    }

    if let ParseState::Inside {
        keyword,
        start_line,
        ..
    } = state
    {
        return Err(BlockFormatError::Unclosed {
            keyword: keyword.to_string(),
            line: start_line,
        });
    }

    Ok(blocks)
}

/// Parse all FILE blocks out of `text`.
///
/// When `root_marker` is given, a path starting with it has the marker and
/// any following separators removed.
#[instrument(skip(text), fields(len = text.len()))]
pub fn parse_blocks(
    text: &str,
    root_marker: Option<&str>,
) -> Result<Vec<PatchBlock>, BlockFormatError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let raw = scan_blocks(text)?;
    let mut out = Vec::new();

    for block in raw {
        if !BlockKind::from_keyword(block.keyword).produces_output() {
            trace!(keyword = block.keyword, "discarding block");
            continue;
        }
        out.push(extract_file(block, root_marker)?);
    }

    debug!(blocks = out.len(), "parsed FILE blocks");
    Ok(out)
}

/// Resolve the path and content of a balanced FILE block.
fn extract_file(block: RawBlock<'_>, root_marker: Option<&str>) -> Result<PatchBlock, BlockFormatError> {
    let header = block.header.trim();

    let (path, content) = if !header.is_empty() {
        (header.to_string(), block.body)
    } else {
        match block.body.split_once('\n') {
            Some((first, rest)) => (first.trim().to_string(), rest.to_string()),
            None => (block.body.trim().to_string(), String::new()),
        }
    };

    let path = match root_marker {
        Some(marker) if !marker.is_empty() => match path.strip_prefix(marker) {
            Some(stripped) => stripped.trim_start_matches(SEPARATORS).to_string(),
            None => path,
        },
        _ => path,
    };

    if segments(&path).next().is_none() {
        return Err(BlockFormatError::EmptyPath {
            line: block.start_line,
        });
    }

    Ok(PatchBlock {
        path,
        content,
        line: block.start_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_tag_variants() {
        let t = scan_tag("@@@FILE_BEGIN a/b.txt").unwrap();
        assert_eq!(t.keyword, "FILE");
        assert_eq!(t.kind, TagKind::Begin);
        assert_eq!(t.header, " a/b.txt");

        let t = scan_tag("   @@@MY_NOTE_END").unwrap();
        assert_eq!(t.keyword, "MY_NOTE");
        assert_eq!(t.kind, TagKind::End);

        assert!(scan_tag("@@@_BEGIN").is_none());
        assert!(scan_tag("@@@FILE").is_none());
        assert!(scan_tag("text @@@FILE_BEGIN").is_none());
        assert!(scan_tag("@@@file_begin").is_none());
    }

    #[test]
    fn test_inline_path_block() {
        let blocks = parse_blocks("@@@FILE_BEGIN a/b.txt\nhello\n@@@FILE_END", None).unwrap();
        assert_eq!(
            blocks,
            vec![PatchBlock {
                path: "a/b.txt".to_string(),
                content: "hello\n".to_string(),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_path_on_first_body_line() {
        let text = "@@@FILE_BEGIN\nsrc/lib.rs\npub fn x() {}\n@@@FILE_END\n";
        let blocks = parse_blocks(text, None).unwrap();
        assert_eq!(blocks[0].path, "src/lib.rs");
        assert_eq!(blocks[0].content, "pub fn x() {}\n");
    }

    #[test]
    fn test_single_line_body_is_path_only() {
        // Body has no newline of its own only when END follows directly
        let text = "@@@FILE_BEGIN\nempty.txt\n@@@FILE_END";
        let blocks = parse_blocks(text, None).unwrap();
        assert_eq!(blocks[0].path, "empty.txt");
        assert_eq!(blocks[0].content, "");
    }

    #[test]
    fn test_content_is_raw() {
        let text = "@@@FILE_BEGIN x.txt\n\n  indented\r\n\ttab\n\n@@@FILE_END\n";
        let blocks = parse_blocks(text, None).unwrap();
        assert_eq!(blocks[0].content, "\n  indented\r\n\ttab\n\n");
    }

    #[test]
    fn test_root_marker_stripped() {
        let text = "@@@FILE_BEGIN {{Root}}/Mod/Mod.Build.cs\nx\n@@@FILE_END\n\
                    @@@FILE_BEGIN Mod/Public/Core.h\ny\n@@@FILE_END\n";
        let blocks = parse_blocks(text, Some("{{Root}}")).unwrap();
        assert_eq!(blocks[0].path, "Mod/Mod.Build.cs");
        assert_eq!(blocks[1].path, "Mod/Public/Core.h");
    }

    #[test]
    fn test_comment_and_unknown_blocks_discarded() {
        let text = "@@@COMMENT_BEGIN\nnotes\n@@@COMMENT_END\n\
                    @@@WHATEVER_BEGIN x\ny\n@@@WHATEVER_END\n\
                    @@@FILE_BEGIN keep.txt\nk\n@@@FILE_END\n";
        let blocks = parse_blocks(text, None).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].path, "keep.txt");
        assert_eq!(blocks[0].line, 7);
    }

    #[test]
    fn test_text_outside_blocks_ignored() {
        let text = "intro\n@@@FILE_BEGIN a.txt\nA\n@@@FILE_END\nchatter\n";
        assert_eq!(parse_blocks(text, None).unwrap().len(), 1);
    }

    #[test]
    fn test_mismatched_tags() {
        let err = parse_blocks("@@@FILE_BEGIN x\n...\n@@@COMMENT_END", None).unwrap_err();
        assert_eq!(
            err,
            BlockFormatError::Mismatched {
                expected: "FILE".to_string(),
                found: "COMMENT".to_string(),
                line: 3,
            }
        );
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_nested_blocks() {
        let text = "@@@FILE_BEGIN a\n@@@COMMENT_BEGIN\n@@@COMMENT_END\n@@@FILE_END\n";
        let err = parse_blocks(text, None).unwrap_err();
        match err {
            BlockFormatError::Nested {
                line, open_line, ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(open_line, 1);
            }
            other => panic!("expected Nested, got {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_end() {
        let err = parse_blocks("hello\n@@@FILE_END\n", None).unwrap_err();
        assert!(matches!(err, BlockFormatError::UnexpectedEnd { line: 2, .. }));
    }

    #[test]
    fn test_unclosed_block() {
        let text = "@@@FILE_BEGIN good.txt\nok\n@@@FILE_END\n@@@FILE_BEGIN bad.txt\nhanging\n";
        let err = parse_blocks(text, None).unwrap_err();
        assert_eq!(
            err,
            BlockFormatError::Unclosed {
                keyword: "FILE".to_string(),
                line: 4,
            }
        );
    }

    #[test]
    fn test_unclosed_unknown_keyword_still_fails() {
        let err = parse_blocks("@@@DRAFT_BEGIN\n", None).unwrap_err();
        assert!(matches!(err, BlockFormatError::Unclosed { line: 1, .. }));
    }

    #[test]
    fn test_empty_path() {
        let err = parse_blocks("\n@@@FILE_BEGIN\n@@@FILE_END\n", None).unwrap_err();
        assert_eq!(err, BlockFormatError::EmptyPath { line: 2 });

        let err = parse_blocks("@@@FILE_BEGIN {{R}}/\nx\n@@@FILE_END\n", Some("{{R}}")).unwrap_err();
        assert_eq!(err, BlockFormatError::EmptyPath { line: 1 });
    }

    #[test]
    fn test_dot_path_is_empty() {
        let err = parse_blocks("@@@FILE_BEGIN .\nhi\n@@@FILE_END\n", None).unwrap_err();
        assert_eq!(err, BlockFormatError::EmptyPath { line: 1 });

        let err = parse_blocks("@@@FILE_BEGIN {{R}}/.\nhi\n@@@FILE_END\n", Some("{{R}}")).unwrap_err();
        assert_eq!(err, BlockFormatError::EmptyPath { line: 1 });

        let err = parse_blocks("@@@FILE_BEGIN\n./\nhi\n@@@FILE_END\n", None).unwrap_err();
        assert_eq!(err, BlockFormatError::EmptyPath { line: 1 });
    }

    #[test]
    fn test_indented_end_tag_drops_its_indent() {
        let blocks = parse_blocks("@@@FILE_BEGIN a.txt\nhi\n   @@@FILE_END\n", None).unwrap();
        assert_eq!(blocks[0].content, "hi\n");

        // Indented payload lines are kept verbatim
        let blocks = parse_blocks("@@@FILE_BEGIN a.txt\n    hi\n@@@FILE_END\n", None).unwrap();
        assert_eq!(blocks[0].content, "    hi\n");
    }

    #[test]
    fn test_structure_checked_before_paths() {
        // The empty path at line 1 loses to the later structural error
        let text = "@@@FILE_BEGIN\n@@@FILE_END\n@@@FILE_END\n";
        let err = parse_blocks(text, None).unwrap_err();
        assert!(matches!(err, BlockFormatError::UnexpectedEnd { line: 3, .. }));
    }

    #[test]
    fn test_blank_text() {
        assert!(parse_blocks("   \n\n", None).unwrap().is_empty());
    }
}
