//! `scaf check`: syntax-only validation of tree text and FILE blocks.

use std::path::Path;

use anyhow::Result;
use tracing::instrument;

use crate::cli::{AppContext, CheckArgs, exit};
use crate::core::multipatch::parse_blocks;
use crate::core::plan::PathPlanBuilder;
use crate::core::tree_text::parse_tree_text;
use crate::infra::io::{InputSource, read_input};

/// Outcome of a syntax check, before printing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary
{
    pub root_marker: Option<String>,
    pub nodes: usize,
    pub file_blocks: usize,
    pub errors: Vec<String>,
}

/// Check `text` without reading or writing the filesystem under any root.
/// Block corruption is returned as an error; everything else is collected.
pub fn check_text(text: &str) -> Result<CheckSummary>
{
    let tree = parse_tree_text(text);
    let mut summary = CheckSummary {
        root_marker: tree
            .root_marker
            .clone(),
        nodes: tree
            .nodes
            .len(),
        ..Default::default()
    };

    if let Some(err) = tree.error
    {
        summary
            .errors
            .push(err.to_string());
        return Ok(summary);
    }

    let blocks = parse_blocks(text, tree.root_marker.as_deref())?;
    summary.file_blocks = blocks.len();

    // Lexical resolution against an empty base: indentation and path
    // safety problems surface without a real root.
    let mut builder = PathPlanBuilder::new(Path::new(""));
    builder
        .add_nodes(
            tree.nodes
                .get(1..)
                .unwrap_or(&[]),
        )
        .add_blocks(&blocks);
    summary
        .errors
        .extend(
            builder
                .finish()
                .errors
                .iter()
                .map(ToString::to_string),
        );

    Ok(summary)
}

#[instrument(skip_all)]
pub fn run(
    args: CheckArgs,
    ctx: &AppContext,
) -> Result<i32>
{
    let input = InputSource::from_args(args.source.input.as_deref(), args.source.from_clipboard);
    let text = read_input(&input)?;
    let summary = check_text(&text)?;

    if !ctx.quiet
    {
        let marker = summary
            .root_marker
            .as_deref()
            .unwrap_or("(none)");
        println!("Input: {}", input.describe());
        println!("Root marker: {marker}");
        println!("Tree nodes: {}", summary.nodes);
        println!("FILE blocks: {}", summary.file_blocks);
    }
    for err in &summary.errors
    {
        eprintln!("{err}");
    }

    if summary
        .errors
        .is_empty()
    {
        if !ctx.quiet
        {
            println!("OK");
        }
        Ok(exit::SUCCESS)
    }
    else
    {
        Ok(exit::INVALID)
    }
}
