use crate::error::{TidyError, TidyResult};
use crate::naming::{Template, TemplateKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of parallel scan threads (0 = auto-detect)
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Enable verbose output by default
    #[serde(default)]
    pub verbose: bool,

    /// Default session log directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// How characters that are illegal in path names are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllegalCharPolicy {
    /// Substitute each illegal character with `replacement`
    Replace,
    /// Drop illegal characters
    Remove,
}

/// Decides when an item counts as standalone for naming purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandaloneRule {
    /// No series name means standalone
    SeriesName,
    /// Both series name and sequence are needed to be part of a series
    SeriesAndSequence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Folder layout relative to the library root; `/` separates components
    #[serde(default = "default_folder_template")]
    pub folder_template: String,

    /// Media file name without extension; must contain {track}
    #[serde(default = "default_file_template")]
    pub file_template: String,

    /// Width of the integer part of {sequence}
    #[serde(default = "default_sequence_padding")]
    pub sequence_padding: usize,

    /// Minimum width of {track}
    #[serde(default = "default_track_padding")]
    pub track_padding: usize,

    #[serde(default = "default_illegal_chars")]
    pub illegal_chars: IllegalCharPolicy,

    /// Substitute used by the `replace` policy
    #[serde(default = "default_replacement")]
    pub replacement: String,

    #[serde(default = "default_standalone_rule")]
    pub standalone_rule: StandaloneRule,

    /// Maximum length for folder/file name components
    #[serde(default = "default_max_name_len")]
    pub max_name_length: usize,

    /// Disambiguation suffix for colliding names; {n} is the counter
    #[serde(default = "default_collision_suffix")]
    pub collision_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Metadata sidecar file name expected in every item directory
    #[serde(default = "default_sidecar_name")]
    pub sidecar_name: String,

    /// How many container levels (author/series folders) are searched for items
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Upper bound of child directories looked at per directory
    #[serde(default)]
    pub max_children_per_dir: Option<usize>,

    /// Extensions (lowercase, no dot) treated as media files
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Remove folders left empty after an item moved away
    #[serde(default = "default_prune_empty_dirs")]
    pub prune_empty_dirs: bool,

    /// Audit log file name, created inside the library root
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
}

// Default value functions
fn default_threads() -> usize {
    0 // 0 means auto-detect
}

fn default_folder_template() -> String {
    "{author}/[{series}/][{sequence} - ]{title}".to_string()
}

fn default_file_template() -> String {
    "[{sequence} - ]{title} - {track}".to_string()
}

fn default_sequence_padding() -> usize {
    2
}

fn default_track_padding() -> usize {
    2
}

fn default_illegal_chars() -> IllegalCharPolicy {
    IllegalCharPolicy::Replace
}

fn default_replacement() -> String {
    "_".to_string()
}

fn default_standalone_rule() -> StandaloneRule {
    StandaloneRule::SeriesName
}

fn default_max_name_len() -> usize {
    128
}

fn default_collision_suffix() -> String {
    " ({n})".to_string()
}

fn default_sidecar_name() -> String {
    "metadata.json".to_string()
}

fn default_max_depth() -> usize {
    3
}

fn default_media_extensions() -> Vec<String> {
    [
        "mp3", "m4b", "m4a", "aac", "flac", "ogg", "opus", "wav", "wma", "aiff", "mp4",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_prune_empty_dirs() -> bool {
    true
}

fn default_log_file_name() -> String {
    "tidy_library_log.txt".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            verbose: false,
            log_dir: None,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            folder_template: default_folder_template(),
            file_template: default_file_template(),
            sequence_padding: default_sequence_padding(),
            track_padding: default_track_padding(),
            illegal_chars: default_illegal_chars(),
            replacement: default_replacement(),
            standalone_rule: default_standalone_rule(),
            max_name_length: default_max_name_len(),
            collision_suffix: default_collision_suffix(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sidecar_name: default_sidecar_name(),
            max_depth: default_max_depth(),
            max_children_per_dir: None,
            media_extensions: default_media_extensions(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            prune_empty_dirs: default_prune_empty_dirs(),
            log_file_name: default_log_file_name(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            naming: NamingConfig::default(),
            scan: ScanConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl NamingConfig {
    /// Check templates and policy values; a bad naming scheme stops everything
    pub fn validate(&self) -> TidyResult<()> {
        Template::parse(&self.folder_template, TemplateKind::Folder)?;
        Template::parse(&self.file_template, TemplateKind::File)?;

        if !self.collision_suffix.contains("{n}") {
            return Err(TidyError::ConfigError(format!(
                "collision_suffix `{}` must contain {{n}}",
                self.collision_suffix
            )));
        }
        if self.collision_suffix.contains('/') || self.collision_suffix.contains('\\') {
            return Err(TidyError::ConfigError(
                "collision_suffix must not contain path separators".to_string(),
            ));
        }
        if self.illegal_chars == IllegalCharPolicy::Replace
            && self.replacement.chars().any(crate::utils::is_illegal_char)
        {
            return Err(TidyError::ConfigError(format!(
                "replacement `{}` contains characters that are illegal in names",
                self.replacement
            )));
        }
        if self.max_name_length < 8 {
            return Err(TidyError::ConfigError(
                "max_name_length must be at least 8".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> TidyResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TidyError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&contents).map_err(|e| match e {
            TidyError::ConfigError(msg) => {
                TidyError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> TidyResult<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| TidyError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.naming.validate()?;
        Ok(config)
    }

    /// Resolve the config for an optional explicit path; an explicit path must load
    pub fn from_optional_path(path: Option<&Path>) -> TidyResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::load_or_default(),
        }
    }

    /// Load `~/.tidyshelf/tidyshelf.toml`, then `./tidyshelf.toml`, else defaults.
    ///
    /// A file that exists but does not parse or validate is an error.
    pub fn load_or_default() -> TidyResult<Self> {
        let mut candidates = Vec::new();
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".tidyshelf").join("tidyshelf.toml"));
        }
        candidates.push(PathBuf::from("tidyshelf.toml"));
        Self::load_first(&candidates)
    }

    /// First existing file among `candidates`, or defaults when none exists
    pub fn load_first(candidates: &[PathBuf]) -> TidyResult<Self> {
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Generate example TOML config file
    pub fn generate_example() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
