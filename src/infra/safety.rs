//! Root directory safety gate
//!
//! A scaffold root must be an existing, ordinary directory: never a
//! filesystem root and never a protected system location or anything
//! inside one. Read-only; nothing is created or modified here.

use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Machine-readable reason a root was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockedReason {
    EmptyPath,
    UnresolvableOrMissing,
    NotADirectory,
    IsDriveRoot,
    IsSystemDir,
    InsideSystemDir,
}

impl BlockedReason {
    pub fn code(self) -> &'static str {
        match self {
            BlockedReason::EmptyPath => "EMPTY_PATH",
            BlockedReason::UnresolvableOrMissing => "UNRESOLVABLE_OR_MISSING",
            BlockedReason::NotADirectory => "NOT_A_DIRECTORY",
            BlockedReason::IsDriveRoot => "IS_DRIVE_ROOT",
            BlockedReason::IsSystemDir => "IS_SYSTEM_DIR",
            BlockedReason::InsideSystemDir => "INSIDE_SYSTEM_DIR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("root rejected ({}): {message}", .reason.code())]
pub struct RootRejected {
    pub reason: BlockedReason,
    pub message: String,
}

impl RootRejected {
    fn new(reason: BlockedReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

#[cfg(windows)]
const PLATFORM_SYSTEM_DIRS: &[&str] = &[];

#[cfg(not(windows))]
const PLATFORM_SYSTEM_DIRS: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/sbin", "/sys", "/usr",
    "/System",
];

/// Windows locations that come from the environment.
const SYSTEM_ENV_VARS: [&str; 8] = [
    "SystemRoot",
    "windir",
    "ProgramFiles",
    "ProgramFiles(x86)",
    "ProgramData",
    "Public",
    "APPDATA",
    "LOCALAPPDATA",
];

/// Protected directories for this machine, resolved where they exist.
pub fn forbidden_system_paths() -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = PLATFORM_SYSTEM_DIRS
        .iter()
        .map(PathBuf::from)
        .collect();

    out.extend(
        SYSTEM_ENV_VARS
            .iter()
            .filter_map(|var| env::var_os(var))
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
    );

    if cfg!(windows) {
        let drive = env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
        out.push(Path::new(&format!("{drive}\\")).join("Users").join("Default"));
    }

    let mut out: Vec<PathBuf> = out
        .into_iter()
        .map(|p| dunce::canonicalize(&p).unwrap_or(p))
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Validate `input` against this machine's protected directories.
pub fn validate_root(input: &str) -> Result<PathBuf, RootRejected> {
    validate_root_against(input, &forbidden_system_paths())
}

/// Validate `input` (with `~` expanded) and return the resolved directory.
pub fn validate_root_against(input: &str, forbidden: &[PathBuf]) -> Result<PathBuf, RootRejected> {
    let input = input.trim();
    if input.is_empty() {
        return Err(RootRejected::new(BlockedReason::EmptyPath, "Input path is empty."));
    }

    let expanded = shellexpand::tilde(input);
    let resolved = dunce::canonicalize(&*expanded).map_err(|e| {
        RootRejected::new(
            BlockedReason::UnresolvableOrMissing,
            format!("Path cannot be resolved or does not exist: {e}"),
        )
    })?;

    if !resolved.is_dir() {
        return Err(RootRejected::new(
            BlockedReason::NotADirectory,
            "Path is not a directory.",
        ));
    }

    if resolved.parent().is_none() {
        return Err(RootRejected::new(
            BlockedReason::IsDriveRoot,
            "Path is a drive root, which is not allowed.",
        ));
    }

    for protected in forbidden {
        if resolved == *protected {
            return Err(RootRejected::new(
                BlockedReason::IsSystemDir,
                format!("Path is a protected system directory: {}", protected.display()),
            ));
        }
        if resolved.starts_with(protected) {
            return Err(RootRejected::new(
                BlockedReason::InsideSystemDir,
                format!(
                    "Path is inside a protected system directory: {}",
                    protected.display()
                ),
            ));
        }
    }

    debug!(root = %resolved.display(), "root accepted");
    Ok(resolved)
}
