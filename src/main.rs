use clap::Parser;
use scaffold_plan::cli::{Cli, Commands, exit, exit_code_for_error};
use scaffold_plan::cli_ext::{apply_cmd, check_cmd, plan_cmd, tree_cmd};
use scaffold_plan::infra::logging;

fn main() {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = cli.context();
    logging::init(ctx.verbose, ctx.no_color);

    let result = match cli.command {
        Commands::Plan(args) => plan_cmd::run(args, &ctx),
        Commands::Apply(args) => apply_cmd::run(args, &ctx),
        Commands::Check(args) => check_cmd::run(args, &ctx),
        Commands::Tree(args) => tree_cmd::run(args, &ctx),
        Commands::Init(args) => {
            scaffold_plan::infra::config::init(args, &ctx).map(|()| exit::SUCCESS)
        }
        Commands::Completions(args) => {
            scaffold_plan::completion::run(args, &ctx).map(|()| exit::SUCCESS)
        }
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", scaffold_plan::cli::render_error(&err, !ctx.no_color));
            exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}
