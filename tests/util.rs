//! Shared test utilities for integration tests
//!
//! Provides common fixture creation and helper functions
//! used across multiple test files.

#![allow(dead_code)]

use std::path::PathBuf;

use assert_fs::prelude::*;

/// Tree text plus one FILE block, the shape most scenarios start from.
pub const GAME_PLAN: &str = "\
@ROOT {{Root}}

{{Root}}/
    Source/
        Game/
            Player.h
    README.md

@@@FILE_BEGIN {{Root}}/Source/Game/Player.cpp
#include \"Player.h\"
@@@FILE_END
";

/// Empty scaffold root with the plan text written next to it.
pub fn make_root() -> assert_fs::TempDir
{
    // Initialize the temporary project root
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    // Keep the input outside the planned paths but inside the sandbox
    tmp.child("plan.txt")
        .write_str(GAME_PLAN)
        .expect("write plan");

    tmp
}

/// Root that already holds some of the planned paths.
pub fn make_populated_root() -> assert_fs::TempDir
{
    let tmp = make_root();

    tmp.child("Source/Game/Player.h")
        .write_str("#pragma once\n")
        .expect("write header");
    tmp.child("Source/Legacy/PlayerControler.h")
        .write_str("// typo\n")
        .expect("write legacy header");

    tmp
}

/// Canonical form of a fixture path, as plans report it.
pub fn canonical(tmp: &assert_fs::TempDir) -> PathBuf
{
    dunce::canonicalize(tmp.path()).expect("canonicalize")
}
