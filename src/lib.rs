//! **scaffold-plan** - Turn indented tree text and multipatch FILE blocks into
//! a validated plan of directories and files, then apply it.
//!
//! Parsing and planning are pure and read-only; only `core::apply` writes.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Command handlers behind the `scaf` subcommands
pub mod cli_ext {
    pub mod apply_cmd;
    pub mod check_cmd;
    pub mod plan_cmd;
    pub mod tree_cmd;
}

/// Parsing, planning, analysis and execution
pub mod core {
    /// Indentation tree parser (`@ROOT` declaration + node lines)
    pub mod tree_text;
    pub use tree_text::{Node, StructuralError, TreeParse, parse_tree_text};

    /// Tagged BEGIN/END block parser with strict balance validation
    pub mod multipatch;
    pub use multipatch::{BlockFormatError, PatchBlock, parse_blocks};

    /// Plan model, path unification and the `generate_plan` entry point
    pub mod plan;
    pub use plan::{PathPlanBuilder, PathState, Plan, PlanError, SimilarMatch, generate_plan};

    /// Planned path vs filesystem classification
    pub mod conflict;
    pub use conflict::{ConflictError, analyze_conflicts};

    /// Duplicate and fuzzy file-name detection
    pub mod similarity;
    pub use similarity::{ExistingIndex, ratio};

    /// Path list / directory to tree text
    pub mod serialize;
    pub use serialize::{render_tree, tree_from_dir};

    /// Plan execution with atomic writes
    pub mod apply;
    pub use apply::{ApplyError, ApplyOptions, ApplyReport, Outcome, execute_plan};

    /// Tables, trees and diffs for the terminal
    pub mod report;
}

/// Infrastructure - configuration, paths, walking, I/O and logging
pub mod infra {
    /// Layered configuration (file + SCAFFOLD_ env vars)
    pub mod config;
    pub use config::{AnalysisConfig, Config, load_config};

    /// Relative path validation, joining and depth ordering
    pub mod paths;

    /// Ignore-aware directory walking
    pub mod walk;
    pub use walk::FileWalker;

    /// Root directory safety validation
    pub mod safety;
    pub use safety::{RootRejected, validate_root};

    /// Input acquisition (file, stdin, clipboard)
    pub mod io;

    /// tracing-subscriber setup for the binary
    pub mod logging;
}

// Strategic re-exports for library consumers
pub use cli::{AppContext, Cli, Commands};
pub use crate::core::{Plan, PlanError, execute_plan, generate_plan};
pub use infra::{AnalysisConfig, Config, FileWalker, load_config};
