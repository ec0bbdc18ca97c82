use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{GraphicalReportHandler, GraphicalTheme};
use std::path::PathBuf;

use crate::core::apply::ApplyError;
use crate::core::multipatch::BlockFormatError;
use crate::core::plan::{Plan, PlanError};
use crate::infra::config::ConfigError;
use crate::infra::safety::RootRejected;

/// Exit codes: 0=success, 1=apply failures, 2=conflicts, 3=invalid input,
/// 4=rejected root, 5=internal
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const FAILED: i32 = 1;
    pub const CONFLICTS: i32 = 2;
    pub const INVALID: i32 = 3;
    pub const ROOT_REJECTED: i32 = 4;
    pub const INTERNAL: i32 = 5;
}

/// Exit code for a generated plan: conflicts outrank other errors.
pub fn exit_code_for_plan(plan: &Plan) -> i32 {
    if plan.has_conflicts() {
        exit::CONFLICTS
    } else if !plan.errors.is_empty() {
        exit::INVALID
    } else {
        exit::SUCCESS
    }
}

/// Exit code for an error that escaped a command handler.
pub fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<RootRejected>().is_some() {
        return exit::ROOT_REJECTED;
    }
    if let Some(plan_err) = err.downcast_ref::<PlanError>() {
        return match plan_err {
            PlanError::RootUnreadable { .. } | PlanError::RootNotDirectory(_) => {
                exit::ROOT_REJECTED
            }
            PlanError::BlockFormat(_) | PlanError::InvalidConfig(_) | PlanError::ScanPattern(_) => {
                exit::INVALID
            }
        };
    }
    if let Some(apply_err) = err.downcast_ref::<ApplyError>() {
        return match apply_err {
            ApplyError::Conflicts(_) => exit::CONFLICTS,
            ApplyError::PlanErrors(_) => exit::INVALID,
        };
    }
    if err.downcast_ref::<BlockFormatError>().is_some()
        || err.downcast_ref::<ConfigError>().is_some()
    {
        return exit::INVALID;
    }
    exit::INTERNAL
}

/// Human-readable error text. Block format errors get a miette report.
pub fn render_error(
    err: &anyhow::Error,
    color: bool,
) -> String {
    let block_err = err.downcast_ref::<BlockFormatError>().or_else(|| {
        match err.downcast_ref::<PlanError>() {
            Some(PlanError::BlockFormat(e)) => Some(e),
            _ => None,
        }
    });

    if let Some(block_err) = block_err {
        let theme = if color {
            GraphicalTheme::unicode()
        } else {
            GraphicalTheme::unicode_nocolor()
        };
        let mut out = String::new();
        if GraphicalReportHandler::new_themed(theme)
            .render_report(&mut out, block_err)
            .is_ok()
        {
            return out;
        }
    }
    format!("Error: {err:#}")
}

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: bool,  // global --verbose
}

#[derive(Parser)]
#[command(name = "scaf")]
#[command(
    about = "Plan and scaffold directory trees from indented tree text and multipatch FILE blocks"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug logging to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a plan and print it without writing anything
    Plan(PlanArgs),

    /// Generate a plan and create its directories and files
    Apply(ApplyArgs),

    /// Validate tree and block syntax without touching the filesystem
    Check(CheckArgs),

    /// Print tree text for an existing directory or a path list
    Tree(TreeArgs),

    /// Initialize a scaffold.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where the plan text comes from (shared by plan/apply/check)
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Plan text file; `-` or omitted reads stdin
    pub input: Option<PathBuf>,

    /// Read the plan text from the system clipboard
    #[arg(long, conflicts_with = "input")]
    pub from_clipboard: bool,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: InputArgs,

    /// Directory that stands in for the root marker
    #[arg(short, long, default_value = ".")]
    pub root: String,

    /// Emit the plan as JSON
    #[arg(long)]
    pub json: bool,

    /// Show unified diffs for files that would be overwritten
    #[arg(long)]
    pub diff: bool,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub source: InputArgs,

    /// Directory that stands in for the root marker
    #[arg(short, long, default_value = ".")]
    pub root: String,

    /// Emit the apply report as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip reading files back after writing them
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: InputArgs,
}

#[derive(Parser, Debug)]
pub struct TreeArgs {
    /// Directory to serialize
    #[arg(default_value = ".", conflicts_with = "from_list")]
    pub path: PathBuf,

    /// Read relative paths (one per line, trailing `/` for directories)
    #[arg(long)]
    pub from_list: Option<PathBuf>,

    /// Root marker to declare (defaults to the configured marker)
    #[arg(long)]
    pub marker: Option<String>,

    /// Extra ignore globs for directory walking
    #[arg(long = "ignore", value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Honor .gitignore files while walking
    #[arg(long)]
    pub gitignore: bool,

    /// Maximum depth to descend
    #[arg(long)]
    pub max_depth: Option<usize>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
