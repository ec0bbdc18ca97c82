//! End-to-end plan generation and execution through the library API

mod util;

use std::fs;

use anyhow::Result;
use assert_fs::prelude::*;

use scaffold_plan::AnalysisConfig;
use scaffold_plan::core::apply::{ApplyError, ApplyOptions, Outcome, execute_plan};
use scaffold_plan::core::plan::{PathState, PlanError, generate_plan};
use scaffold_plan::core::serialize::tree_from_dir;
use scaffold_plan::infra::walk::FileWalker;

use util::{GAME_PLAN, canonical, make_populated_root, make_root};

#[test]
fn test_fresh_root_plans_everything_new() -> Result<()>
{
    let tmp = make_root();
    let root = canonical(&tmp);

    let plan = generate_plan(&root, GAME_PLAN, &AnalysisConfig::default())?;

    assert!(plan.is_clean(), "unexpected errors: {:?}", plan.errors);
    assert_eq!(plan.root_marker.as_deref(), Some("{{Root}}"));
    assert!(plan.planned_dirs.contains(&root.join("Source")));
    assert!(plan.planned_dirs.contains(&root.join("Source/Game")));
    assert_eq!(plan.planned_files.len(), 3);
    assert!(plan.planned_files.contains(&root.join("Source/Game/Player.cpp")));

    assert!(plan
        .path_states
        .values()
        .all(|s| *s == PathState::New));
    assert_eq!(
        plan.content_for(&root.join("Source/Game/Player.cpp")),
        Some("#include \"Player.h\"\n")
    );
    Ok(())
}

#[test]
fn test_existing_paths_are_classified() -> Result<()>
{
    let tmp = make_populated_root();
    let root = canonical(&tmp);

    let plan = generate_plan(&root, GAME_PLAN, &AnalysisConfig::default())?;

    assert_eq!(plan.state_of(&root.join("Source")), Some(PathState::Exists));
    assert_eq!(
        plan.state_of(&root.join("Source/Game/Player.h")),
        Some(PathState::Exists)
    );
    assert_eq!(
        plan.state_of(&root.join("Source/Game/Player.cpp")),
        Some(PathState::New)
    );
    Ok(())
}

#[test]
fn test_payload_over_existing_file_is_overwrite() -> Result<()>
{
    let tmp = make_root();
    tmp.child("Source/Game/Player.cpp")
        .write_str("old\n")?;
    let root = canonical(&tmp);

    let plan = generate_plan(&root, GAME_PLAN, &AnalysisConfig::default())?;

    assert_eq!(
        plan.state_of(&root.join("Source/Game/Player.cpp")),
        Some(PathState::Overwrite)
    );
    assert!(plan.is_clean());
    Ok(())
}

#[test]
fn test_file_in_place_of_directory_conflicts() -> Result<()>
{
    let tmp = make_root();
    tmp.child("Source").write_str("not a dir")?;
    let root = canonical(&tmp);

    let plan = generate_plan(&root, GAME_PLAN, &AnalysisConfig::default())?;

    assert_eq!(plan.state_of(&root.join("Source")), Some(PathState::ConflictFile));
    assert!(plan.has_conflicts());
    assert!(plan
        .errors
        .iter()
        .any(|e| e.contains("where a directory is planned")));

    let err = execute_plan(&plan, &ApplyOptions::default()).unwrap_err();
    assert!(matches!(err, ApplyError::Conflicts(_)));
    Ok(())
}

#[test]
fn test_typo_sibling_is_reported_as_similar() -> Result<()>
{
    let tmp = make_populated_root();
    let root = canonical(&tmp);
    let text = "@ROOT R\nR/\n    Source/\n        PlayerController.h\n";

    let plan = generate_plan(&root, text, &AnalysisConfig::default())?;

    let target = root.join("Source/PlayerController.h");
    let matches = &plan.similarity_warnings[&target];
    assert_eq!(matches[0].existing_name, "PlayerControler.h");
    assert!(matches[0].ratio > 0.9);
    assert!(plan.duplicate_warnings.is_empty());
    Ok(())
}

#[test]
fn test_disabled_similarity_scan_reports_nothing() -> Result<()>
{
    let tmp = make_populated_root();
    let root = canonical(&tmp);
    let text = "@ROOT R\nR/\n    Source/\n        PlayerController.h\n";
    let cfg = AnalysisConfig::default().with_similarity_scan(false);

    let plan = generate_plan(&root, text, &cfg)?;

    assert!(plan.similarity_warnings.is_empty());
    Ok(())
}

#[test]
fn test_same_name_elsewhere_is_a_duplicate() -> Result<()>
{
    let tmp = make_populated_root();
    let root = canonical(&tmp);
    let text = "@ROOT R\nR/\n    Public/\n        Player.h\n";

    let plan = generate_plan(&root, text, &AnalysisConfig::default())?;

    let dups = &plan.duplicate_warnings[&root.join("Public/Player.h")];
    assert_eq!(dups, &vec![root.join("Source/Game/Player.h")]);
    Ok(())
}

#[test]
fn test_broken_blocks_abort_generation()
{
    let tmp = make_root();
    let root = canonical(&tmp);
    let text = "@ROOT R\nR/\n    a.txt\n@@@FILE_BEGIN b.txt\nbody\n";

    let err = generate_plan(&root, text, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, PlanError::BlockFormat(_)));
}

#[test]
fn test_tree_errors_land_in_plan_errors() -> Result<()>
{
    let tmp = make_root();
    let root = canonical(&tmp);

    let plan = generate_plan(&root, "Source/\n    a.txt\n", &AnalysisConfig::default())?;

    assert_eq!(plan.errors.len(), 1);
    assert!(plan.errors[0].contains("@ROOT"));
    assert!(plan.planned_dirs.is_empty());
    Ok(())
}

#[test]
fn test_escaping_block_path_is_rejected() -> Result<()>
{
    let tmp = make_root();
    let root = canonical(&tmp);
    let text = "@@@FILE_BEGIN ../outside.txt\nx\n@@@FILE_END\n";

    let plan = generate_plan(&root, text, &AnalysisConfig::default())?;

    assert!(!plan.errors.is_empty());
    assert!(plan.planned_files.is_empty());
    assert!(!tmp.path().parent().unwrap().join("outside.txt").exists());
    Ok(())
}

#[test]
fn test_apply_creates_tree_and_payloads() -> Result<()>
{
    let tmp = make_root();
    let root = canonical(&tmp);
    let plan = generate_plan(&root, GAME_PLAN, &AnalysisConfig::default())?;

    let report = execute_plan(&plan, &ApplyOptions::default())?;

    assert!(report.is_success());
    assert_eq!(report.stats.dirs_created, 2);
    assert_eq!(report.stats.files_created, 3);
    assert!(root.join("Source/Game").is_dir());
    assert_eq!(fs::read_to_string(root.join("README.md"))?, "");
    assert_eq!(
        fs::read_to_string(root.join("Source/Game/Player.cpp"))?,
        "#include \"Player.h\"\n"
    );
    assert!(report
        .final_states
        .values()
        .all(|s| *s == PathState::Exists));
    Ok(())
}

#[test]
fn test_second_apply_is_a_no_op() -> Result<()>
{
    let tmp = make_root();
    let root = canonical(&tmp);
    let cfg = AnalysisConfig::default();

    let first = generate_plan(&root, GAME_PLAN, &cfg)?;
    execute_plan(&first, &ApplyOptions::default())?;

    // The payload file is now an Overwrite with identical content
    let second = generate_plan(&root, GAME_PLAN, &cfg)?;
    let report = execute_plan(&second, &ApplyOptions::default())?;

    assert!(report
        .actions
        .iter()
        .all(|a| a.outcome == Outcome::Skipped));
    Ok(())
}

#[test]
fn test_dry_run_touches_nothing() -> Result<()>
{
    let tmp = make_root();
    let root = canonical(&tmp);
    let plan = generate_plan(&root, GAME_PLAN, &AnalysisConfig::default())?;

    let report = execute_plan(
        &plan,
        &ApplyOptions {
            dry_run: true,
            skip_verify: false,
        },
    )?;

    assert!(report.dry_run);
    assert_eq!(report.stats.files_created, 3);
    assert!(!root.join("Source").exists());
    assert!(!root.join("README.md").exists());
    Ok(())
}

#[test]
fn test_serialized_directory_replans_as_existing() -> Result<()>
{
    let tmp = make_root();
    let root = canonical(&tmp);
    let plan = generate_plan(&root, GAME_PLAN, &AnalysisConfig::default())?;
    execute_plan(&plan, &ApplyOptions::default())?;

    let walker = FileWalker::new(&[])?;
    let text = tree_from_dir(&root, "{{Root}}", &walker);
    assert!(text.starts_with("@ROOT {{Root}}\n\n{{Root}}/\n"));

    let replanned = generate_plan(&root, &text, &AnalysisConfig::default())?;
    assert!(replanned.is_clean(), "errors: {:?}", replanned.errors);
    assert!(replanned
        .path_states
        .values()
        .all(|s| *s == PathState::Exists));
    assert!(replanned.planned_files.contains(&root.join("plan.txt")));
    Ok(())
}
