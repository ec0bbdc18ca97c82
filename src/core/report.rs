//! Human-readable plan and apply reports
//!
//! Everything renders into a `String` so the CLI decides where it goes and
//! tests can inspect it. Colors are opt-in per call.

use std::collections::BTreeMap;
use std::fmt::{Display, Write as _};
use std::fs;
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use memchr::memchr_iter;
use owo_colors::{AnsiColors, OwoColorize};
use ptree::{PrintConfig, TreeBuilder};
use similar::TextDiff;
use tabled::{Table, Tabled};

use crate::core::apply::ApplyReport;
use crate::core::plan::{PathState, Plan};
use crate::infra::paths::display_relative;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub color: bool,
    /// Entries per warning list before "...and N more."
    pub max_list_items: usize,
    /// Unified diffs for files that would be overwritten
    pub show_diff: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            color: false,
            max_list_items: 100,
            show_diff: false,
        }
    }
}

/// Counts shown in the summary table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub new_dirs: usize,
    pub new_files: usize,
    pub overwrite_files: usize,
    pub existing: usize,
    pub conflicts: usize,
    pub payload_lines: usize,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Plan")]
    metric: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

#[derive(Tabled)]
struct ApplyRow {
    #[tabled(rename = "Result")]
    metric: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

fn paint(text: impl Display, color: Option<AnsiColors>, enabled: bool) -> String {
    match color {
        Some(c) if enabled => text.color(c).to_string(),
        _ => text.to_string(),
    }
}

fn state_color(state: PathState) -> Option<AnsiColors> {
    match state {
        PathState::New => Some(AnsiColors::Green),
        PathState::Exists => None,
        PathState::Overwrite => Some(AnsiColors::Yellow),
        PathState::ConflictFile | PathState::ConflictDir => Some(AnsiColors::Red),
    }
}

/// Color for a file name by extension.
pub fn color_by_ext(name: &str) -> Option<AnsiColors> {
    let lower = name.to_lowercase();
    if lower.ends_with(".build.cs") || lower.ends_with(".target.cs") {
        return Some(AnsiColors::Magenta);
    }
    let ext = Path::new(&lower).extension()?.to_str()?.to_string();
    match ext.as_str() {
        "h" | "hpp" | "inl" => Some(AnsiColors::Cyan),
        "c" | "cpp" | "cc" | "cxx" => Some(AnsiColors::Red),
        "cs" => Some(AnsiColors::Green),
        "uproject" | "uplugin" | "json" | "toml" | "ini" => Some(AnsiColors::BrightBlue),
        "md" | "txt" => Some(AnsiColors::White),
        _ => None,
    }
}

/// Newline-counted lines in a payload; a final unterminated line counts.
pub fn count_lines(s: &str) -> usize {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return 0;
    }
    let nl = memchr_iter(b'\n', bytes).count();
    if bytes.ends_with(b"\n") { nl } else { nl + 1 }
}

pub fn summarize(plan: &Plan) -> PlanSummary {
    PlanSummary {
        new_dirs: plan.count_state(PathState::New, true),
        new_files: plan.count_state(PathState::New, false),
        overwrite_files: plan.count_state(PathState::Overwrite, false),
        existing: plan
            .path_states
            .values()
            .filter(|s| **s == PathState::Exists)
            .count(),
        conflicts: plan
            .path_states
            .values()
            .filter(|s| s.is_conflict())
            .count(),
        payload_lines: plan.file_contents.values().map(|c| count_lines(c)).sum(),
    }
}

pub fn summary_table(summary: &PlanSummary) -> String {
    let rows = vec![
        SummaryRow { metric: "New directories", count: summary.new_dirs },
        SummaryRow { metric: "New files", count: summary.new_files },
        SummaryRow { metric: "Files to overwrite", count: summary.overwrite_files },
        SummaryRow { metric: "Already existing", count: summary.existing },
        SummaryRow { metric: "Conflicts", count: summary.conflicts },
        SummaryRow { metric: "Payload lines", count: summary.payload_lines },
    ];
    Table::new(rows).to_string()
}

#[derive(Debug, Default)]
struct Branch {
    is_dir: bool,
    state: Option<PathState>,
    children: BTreeMap<String, Branch>,
}

fn add_branch(builder: &mut TreeBuilder, name: &str, branch: &Branch, color: bool) {
    let state = branch
        .state
        .map(|s| format!(" [{}]", paint(s, state_color(s), color)))
        .unwrap_or_default();
    let label = if branch.is_dir {
        format!("{}/{}", paint(name, Some(AnsiColors::Blue), color), state)
    } else {
        format!("{}{}", paint(name, color_by_ext(name), color), state)
    };

    if branch.children.is_empty() {
        builder.add_empty_child(label);
        return;
    }
    builder.begin_child(label);
    for (child_name, child) in &branch.children {
        add_branch(builder, child_name, child, color);
    }
    builder.end_child();
}

/// Planned paths as a tree under the root, each labeled with its state.
pub fn render_plan_tree(plan: &Plan, color: bool) -> Result<String> {
    let mut top = Branch::default();
    let entries = plan
        .dirs_by_depth()
        .into_iter()
        .map(|p| (p, true))
        .chain(plan.files_by_depth().into_iter().map(|p| (p, false)));

    for (path, is_dir) in entries {
        let rel = display_relative(&plan.root_path, path);
        let mut cur = &mut top;
        for seg in rel.split('/') {
            cur = cur.children.entry(seg.to_string()).or_default();
        }
        cur.is_dir = is_dir;
        cur.state = plan.state_of(path);
    }

    let root_label = match &plan.root_marker {
        Some(marker) => format!("{} -> {}", marker, plan.root_path.display()),
        None => plan.root_path.display().to_string(),
    };
    let mut builder = TreeBuilder::new(paint(root_label, Some(AnsiColors::Blue), color));
    for (name, branch) in &top.children {
        add_branch(&mut builder, name, branch, color);
    }
    let tree = builder.build();

    let mut buf = Vec::new();
    ptree::write_tree_with(&tree, &mut buf, &PrintConfig::default())?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn push_capped<I>(out: &mut String, items: I, cap: usize)
where
    I: ExactSizeIterator<Item = String>,
{
    let total = items.len();
    for item in items.take(cap) {
        let _ = writeln!(out, "{item}");
    }
    if total > cap {
        let _ = writeln!(out, "  ...and {} more.", total - cap);
    }
}

/// Duplicate and similarity warnings, each list capped.
pub fn render_warnings(plan: &Plan, opts: &ReportOptions) -> String {
    let root = &plan.root_path;
    let mut out = String::new();

    if !plan.duplicate_warnings.is_empty() {
        let _ = writeln!(out, "{}", paint("Duplicate names:", Some(AnsiColors::Yellow), opts.color));
        let lines: Vec<String> = plan
            .duplicate_warnings
            .iter()
            .map(|(target, others)| {
                format!(
                    "  {} also exists at: {}",
                    display_relative(root, target),
                    others.iter().map(|p| display_relative(root, p)).join(", ")
                )
            })
            .collect();
        push_capped(&mut out, lines.into_iter(), opts.max_list_items);
    }

    if !plan.similarity_warnings.is_empty() {
        let _ = writeln!(out, "{}", paint("Similar names:", Some(AnsiColors::Yellow), opts.color));
        let lines: Vec<String> = plan
            .similarity_warnings
            .iter()
            .flat_map(|(target, matches)| {
                matches.iter().map(move |m| {
                    format!(
                        "  {} ~ {} ({:.2}) at: {}",
                        display_relative(root, target),
                        m.existing_name,
                        m.ratio,
                        m.paths.iter().map(|p| display_relative(root, p)).join(", ")
                    )
                })
            })
            .collect();
        push_capped(&mut out, lines.into_iter(), opts.max_list_items);
    }

    out
}

pub fn render_errors(plan: &Plan, color: bool) -> String {
    let mut out = String::new();
    if plan.errors.is_empty() {
        return out;
    }
    let _ = writeln!(out, "{}", paint("Errors:", Some(AnsiColors::Red), color));
    for err in &plan.errors {
        let _ = writeln!(out, "  {err}");
    }
    out
}

/// Unified diffs between current and planned content of overwrite files.
pub fn render_diffs(plan: &Plan) -> String {
    let mut out = String::new();
    for path in plan.files_by_depth() {
        if plan.state_of(path) != Some(PathState::Overwrite) {
            continue;
        }
        let Some(new) = plan.content_for(path) else {
            continue;
        };
        let old = fs::read_to_string(path).unwrap_or_default();
        let rel = display_relative(&plan.root_path, path);
        let diff = TextDiff::from_lines(old.as_str(), new);
        let _ = write!(
            out,
            "{}",
            diff.unified_diff()
                .context_radius(3)
                .header(&format!("a/{rel}"), &format!("b/{rel}"))
        );
    }
    out
}

/// Full plan report: summary, tree, warnings, errors and optional diffs.
pub fn render_plan(plan: &Plan, opts: &ReportOptions) -> Result<String> {
    let mut out = String::new();
    out.push_str(&summary_table(&summarize(plan)));
    out.push('\n');
    out.push_str(&render_plan_tree(plan, opts.color)?);

    let warnings = render_warnings(plan, opts);
    if !warnings.is_empty() {
        out.push('\n');
        out.push_str(&warnings);
    }
    let errors = render_errors(plan, opts.color);
    if !errors.is_empty() {
        out.push('\n');
        out.push_str(&errors);
    }
    if opts.show_diff {
        let diffs = render_diffs(plan);
        if !diffs.is_empty() {
            out.push('\n');
            out.push_str(&diffs);
        }
    }
    Ok(out)
}

/// Apply outcome counts plus one line per failure.
pub fn render_apply_report(report: &ApplyReport, root: &Path, color: bool) -> String {
    let s = report.stats;
    let rows = vec![
        ApplyRow { metric: "Directories created", count: s.dirs_created },
        ApplyRow { metric: "Files created", count: s.files_created },
        ApplyRow { metric: "Files overwritten", count: s.files_overwritten },
        ApplyRow { metric: "Skipped", count: s.skipped },
        ApplyRow { metric: "Failed", count: s.failed },
    ];

    let mut out = String::new();
    if report.dry_run {
        let _ = writeln!(out, "{}", paint("DRY RUN: nothing was written", Some(AnsiColors::Yellow), color));
    }
    out.push_str(&Table::new(rows).to_string());
    out.push('\n');
    for (path, reason) in report.failures() {
        let _ = writeln!(
            out,
            "{} {}: {}",
            paint("[FAILED]", Some(AnsiColors::Red), color),
            display_relative(root, path),
            reason
        );
    }
    out
}
