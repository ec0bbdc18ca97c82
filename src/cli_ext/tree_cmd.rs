//! `scaf tree`: emit tree text for an existing directory or a path list.

use anyhow::{Context, Result};
use tracing::instrument;

use crate::cli::{AppContext, TreeArgs, exit};
use crate::core::serialize::{render_tree, tree_from_dir};
use crate::infra::config::load_config;
use crate::infra::walk::FileWalker;

#[instrument(skip_all)]
pub fn run(
    args: TreeArgs,
    _ctx: &AppContext,
) -> Result<i32>
{
    let config = load_config()?;
    let marker = args
        .marker
        .unwrap_or(config.root_marker);
    if marker.is_empty() || marker.contains(char::is_whitespace)
    {
        anyhow::bail!("root marker '{marker}' must be non-empty and contain no whitespace");
    }

    let text = match &args.from_list
    {
        Some(list) =>
        {
            let raw = std::fs::read_to_string(list)
                .with_context(|| format!("Failed to read path list {}", list.display()))?;
            render_tree(raw.lines().map(str::trim), &marker)
        }
        None =>
        {
            let mut ignores = config
                .analysis
                .scan_ignore_patterns
                .clone();
            ignores.extend(args.ignore);

            let walker = FileWalker::new(&ignores)?
                .with_gitignore(args.gitignore)
                .with_max_depth(args.max_depth);
            let root = dunce::canonicalize(&args.path)
                .with_context(|| format!("Failed to resolve {}", args.path.display()))?;
            if !root.is_dir()
            {
                anyhow::bail!("{} is not a directory", root.display());
            }
            tree_from_dir(&root, &marker, &walker)
        }
    };

    println!("{text}");
    Ok(exit::SUCCESS)
}
