//! `scaf apply`: generate a plan, refuse it on errors or conflicts, then
//! create its directories and files.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing::{info, instrument};

use crate::cli::{AppContext, ApplyArgs, exit, exit_code_for_plan};
use crate::cli_ext::plan_cmd::{LoadedPlan, load_plan, report_options};
use crate::core::apply::{ApplyOptions, execute_plan};
use crate::core::report::{render_apply_report, render_errors, render_plan};

#[instrument(skip_all)]
pub fn run(
    args: ApplyArgs,
    ctx: &AppContext,
) -> Result<i32>
{
    let LoadedPlan { config, root, plan } = load_plan(&args.source, &args.root)?;

    if !plan.is_clean()
    {
        if args.json
        {
            let out = json!({ "applied": false, "errors": plan.errors });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        else
        {
            eprint!("{}", render_errors(&plan, !ctx.no_color));
            if !ctx.quiet
            {
                let msg = "Refusing to apply: fix the errors above first.";
                if ctx.no_color
                {
                    eprintln!("{msg}");
                }
                else
                {
                    eprintln!("{}", msg.red());
                }
            }
        }
        return Ok(exit_code_for_plan(&plan));
    }

    if !ctx.quiet && !args.json
    {
        print!("{}", render_plan(&plan, &report_options(&config, ctx, false))?);
        println!();
    }

    let options = ApplyOptions {
        dry_run: ctx.dry_run,
        skip_verify: args.no_verify,
    };
    let report = execute_plan(&plan, &options).context("apply plan")?;
    info!(?report.stats, "plan applied");

    if args.json
    {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    else if !ctx.quiet
    {
        print!("{}", render_apply_report(&report, &root, !ctx.no_color));
    }

    Ok(if report.is_success() { exit::SUCCESS } else { exit::FAILED })
}
