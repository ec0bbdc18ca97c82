//! `scaf plan`: generate a plan and print it without writing anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::cli::{AppContext, InputArgs, PlanArgs, exit_code_for_plan};
use crate::core::plan::{Plan, generate_plan};
use crate::core::report::{ReportOptions, render_errors, render_plan};
use crate::infra::config::{Config, load_config};
use crate::infra::io::{InputSource, read_input};
use crate::infra::safety::validate_root;

/// Everything `plan` and `apply` share: config, resolved root and the plan.
pub struct LoadedPlan
{
    pub config: Config,
    pub root: PathBuf,
    pub plan: Plan,
}

/// Validate the root, read the input and generate a plan.
pub fn load_plan(
    source: &InputArgs,
    root: &str,
) -> Result<LoadedPlan>
{
    let config = load_config()?;
    let root = validate_root(root)?;

    let input = InputSource::from_args(source.input.as_deref(), source.from_clipboard);
    let text = read_input(&input)?;
    debug!(source = %input.describe(), bytes = text.len(), "input read");

    let plan = generate_plan(&root, &text, &config.analysis)?;
    Ok(LoadedPlan { config, root, plan })
}

pub fn report_options(
    config: &Config,
    ctx: &AppContext,
    show_diff: bool,
) -> ReportOptions
{
    ReportOptions {
        color: !ctx.no_color,
        max_list_items: config
            .report
            .max_list_items,
        show_diff,
    }
}

#[instrument(skip_all)]
pub fn run(
    args: PlanArgs,
    ctx: &AppContext,
) -> Result<i32>
{
    let LoadedPlan { config, plan, .. } = load_plan(&args.source, &args.root)?;

    if args.json
    {
        let json = serde_json::to_string_pretty(&plan).context("serialize plan")?;
        println!("{json}");
    }
    else if !ctx.quiet
    {
        let opts = report_options(&config, ctx, args.diff);
        print!("{}", render_plan(&plan, &opts)?);
    }
    else
    {
        eprint!("{}", render_errors(&plan, !ctx.no_color));
    }

    Ok(exit_code_for_plan(&plan))
}
