use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const BOM: char = '\u{feff}';

/// Where plan text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Stdin,
    Clipboard,
}

impl InputSource {
    /// `--from-clipboard` wins; `-` or no path means stdin.
    pub fn from_args(input: Option<&Path>, from_clipboard: bool) -> Self {
        if from_clipboard {
            return InputSource::Clipboard;
        }
        match input {
            Some(p) if p != Path::new("-") => InputSource::File(p.to_path_buf()),
            _ => InputSource::Stdin,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::File(p) => p.display().to_string(),
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::Clipboard => "<clipboard>".to_string(),
        }
    }
}

/// Read the whole input as text with a leading BOM removed.
pub fn read_input(source: &InputSource) -> Result<String> {
    let text = match source {
        InputSource::File(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?,
        InputSource::Stdin => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
        InputSource::Clipboard => read_clipboard()?,
    };

    Ok(strip_bom(text))
}

pub fn strip_bom(text: String) -> String {
    match text.strip_prefix(BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn read_clipboard() -> Result<String> {
    let mut cb = arboard::Clipboard::new().context("clipboard init")?;
    cb.get_text().context("clipboard get")
}
