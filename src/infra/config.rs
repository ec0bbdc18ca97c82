use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{AppContext, InitArgs};

/// File names probed, in priority order, when loading configuration
pub const CONFIG_FILES: [&str; 4] =
    ["scaffold.toml", "scaffold.yaml", "scaffold.json", ".scaffold.toml"];

/// Extensions whose files are indexed for duplicate/similarity checks
pub const DEFAULT_EXTENSIONS: [&str; 9] = [
    ".h",
    ".hpp",
    ".cpp",
    ".c",
    ".cs",
    ".Build.cs",
    ".Target.cs",
    ".uproject",
    ".uplugin",
];

pub const DEFAULT_THRESHOLD: f64 = 0.86;

pub const DEFAULT_ROOT_MARKER: &str = "{{Root}}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError
{
    #[error("similarity_ratio_threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(String),

    #[error("scan_include_extensions entry '{0}' must start with '.'")]
    BadExtension(String),

    #[error("report.max_list_items must be at least 1")]
    ZeroListItems,

    #[error("root_marker must not be empty or contain whitespace")]
    BadRootMarker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Placeholder used when serializing trees
    pub root_marker: String,

    /// Duplicate and similarity analysis
    pub analysis: AnalysisConfig,

    /// Report rendering limits
    pub report: ReportConfig,
}

/// Settings consumed by the conflict and similarity analyzers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig
{
    pub enable_similarity_scan: bool,
    pub similarity_ratio_threshold: f64,
    pub normalize_lower: bool,
    pub normalize_remove_nonalnum: bool,

    /// Suffixes matched case-insensitively, multi-dot allowed (".Build.cs")
    pub scan_include_extensions: BTreeSet<String>,

    /// Globs pruned from the existing-file scan, relative to the root
    pub scan_ignore_patterns: Vec<String>,

    pub scan_respect_gitignore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig
{
    /// Warning list entries shown before "...and N more."
    pub max_list_items: usize,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            root_marker: DEFAULT_ROOT_MARKER.to_string(),
            analysis: AnalysisConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for AnalysisConfig
{
    fn default() -> Self
    {
        Self {
            enable_similarity_scan: true,
            similarity_ratio_threshold: DEFAULT_THRESHOLD,
            normalize_lower: true,
            normalize_remove_nonalnum: true,
            scan_include_extensions: DEFAULT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            scan_ignore_patterns: vec![".git/**".to_string()],
            scan_respect_gitignore: false,
        }
    }
}

impl Default for ReportConfig
{
    fn default() -> Self
    {
        Self { max_list_items: 100 }
    }
}

impl Config
{
    pub fn validate(&self) -> Result<(), ConfigError>
    {
        self.analysis
            .validate()?;
        if self
            .report
            .max_list_items
            == 0
        {
            return Err(ConfigError::ZeroListItems);
        }
        if self
            .root_marker
            .is_empty()
            || self
                .root_marker
                .contains(char::is_whitespace)
        {
            return Err(ConfigError::BadRootMarker);
        }
        Ok(())
    }
}

impl AnalysisConfig
{
    /// Reject thresholds outside [0, 1] (NaN included) and bare extensions.
    pub fn validate(&self) -> Result<(), ConfigError>
    {
        let t = self.similarity_ratio_threshold;
        if !(0.0..=1.0).contains(&t)
        {
            return Err(ConfigError::ThresholdOutOfRange(t.to_string()));
        }
        if let Some(bad) = self
            .scan_include_extensions
            .iter()
            .find(|e| !e.starts_with('.'))
        {
            return Err(ConfigError::BadExtension(bad.clone()));
        }
        Ok(())
    }

    pub fn with_similarity_scan(
        mut self,
        enabled: bool,
    ) -> Self
    {
        self.enable_similarity_scan = enabled;
        self
    }

    pub fn with_threshold(
        mut self,
        threshold: f64,
    ) -> Self
    {
        self.similarity_ratio_threshold = threshold;
        self
    }

    pub fn with_normalization(
        mut self,
        lower: bool,
        remove_nonalnum: bool,
    ) -> Self
    {
        self.normalize_lower = lower;
        self.normalize_remove_nonalnum = remove_nonalnum;
        self
    }

    pub fn with_extensions<I, S>(
        mut self,
        extensions: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scan_include_extensions = extensions
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    pub fn with_ignore_patterns(
        mut self,
        patterns: Vec<String>,
    ) -> Self
    {
        self.scan_ignore_patterns = patterns;
        self
    }

    pub fn with_gitignore(
        mut self,
        respect: bool,
    ) -> Self
    {
        self.scan_respect_gitignore = respect;
        self
    }
}

/// Load configuration from the current directory and the environment.
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load configuration from the first config file found in `dir`, then
/// `SCAFFOLD_`-prefixed environment variables (`SCAFFOLD_ANALYSIS__NORMALIZE_LOWER=false`).
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    if let Some(path) = CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
    {
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCAFFOLD")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;
    parsed
        .validate()
        .context("Invalid configuration")?;

    Ok(parsed)
}

/// Path the `init` command writes to.
pub fn config_path_in(dir: &Path) -> PathBuf
{
    dir.join(CONFIG_FILES[0])
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = config_path_in(&args.path);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
