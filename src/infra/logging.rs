use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when RUST_LOG is not set.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "scaffold_plan=debug,scaf=debug" } else { "warn" }
}

/// Install the stderr subscriber. RUST_LOG overrides the default filter.
/// Safe to call more than once; later calls are no-ops.
pub fn init(
    verbose: bool,
    no_color: bool,
) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(verbose)
        .try_init();
}
