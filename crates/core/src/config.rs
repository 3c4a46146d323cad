//! TOML configuration for a mining run.
//!
//! Every field has a default so the CLI can run without a config file; the
//! file and the command-line flags only override what they set. Paths may
//! start with `~/`, which [`MinerConfig::expand_paths`] resolves against the
//! home directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::merge::EngineKind;
use crate::output::LEDGER_FILE_NAME;
use crate::scenario::filter::DEFAULT_THRESHOLD;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Configuration for one mining run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MinerConfig {
    /// Which repository to mine and where to get it.
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Where the dataset goes.
    #[serde(default)]
    pub output: OutputConfig,

    /// Extraction and filtering settings.
    #[serde(default)]
    pub mining: MiningConfig,

    /// Log level and optional log file.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Repository location and acquisition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    /// Local path of the repository.
    #[serde(default)]
    pub path: PathBuf,

    /// Remote to clone from when `path` does not exist yet.
    #[serde(default)]
    pub url: Option<String>,

    /// Branch to walk. Unset or unknown branches fall back to `HEAD`.
    #[serde(default)]
    pub branch: Option<String>,
}

/// Output root and ledger location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Root directory for scenario artifacts.
    #[serde(default = "default_output_root")]
    pub root: PathBuf,

    /// Ledger file. Defaults to `statistics.csv` under `root`.
    #[serde(default)]
    pub ledger: Option<PathBuf>,

    /// Clear `root` before the run. When false, artifacts are added to the
    /// existing tree and rows appended to the existing ledger.
    #[serde(default = "default_true")]
    pub clean: bool,
}

fn default_output_root() -> PathBuf {
    PathBuf::from("merge-scenarios")
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { root: default_output_root(), ledger: None, clean: true }
    }
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MiningConfig {
    /// Minimum total conflict blocks for a scenario to be recorded.
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Only paths ending with one of these suffixes are extracted. Empty
    /// means all paths.
    #[serde(default)]
    pub suffixes: Vec<String>,

    /// Glob patterns of paths never extracted.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Merge engine used to recompute conflicts.
    #[serde(default)]
    pub engine: EngineKind,

    /// Kill the external merge tool after this many seconds.
    #[serde(default)]
    pub merge_timeout_secs: Option<u64>,
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            suffixes: Vec::new(),
            ignore_patterns: Vec::new(),
            engine: EngineKind::default(),
            merge_timeout_secs: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file: None }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl MinerConfig {
    /// Load a [`MinerConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: MinerConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Expand a leading `~/` in every path field.
    pub fn expand_paths(&mut self) {
        self.repository.path = expand_tilde(&self.repository.path);
        self.output.root = expand_tilde(&self.output.root);
        self.output.ledger = self.output.ledger.as_deref().map(expand_tilde);
        self.logging.file = self.logging.file.as_deref().map(expand_tilde);
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repository.path".into(),
                detail: "repository path must not be empty".into(),
            });
        }
        if let Some(url) = &self.repository.url {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "repository.url".into(),
                    detail: "remote URL must not be empty when set".into(),
                });
            }
        }
        if self.output.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output.root".into(),
                detail: "output root must not be empty".into(),
            });
        }
        if self.mining.threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mining.threshold".into(),
                detail: "threshold must be >= 1".into(),
            });
        }
        if self.mining.suffixes.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "mining.suffixes".into(),
                detail: "suffixes must not be empty strings".into(),
            });
        }
        if self.mining.ignore_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "mining.ignore_patterns".into(),
                detail: "ignore patterns must not be empty strings".into(),
            });
        }
        if self.mining.merge_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "mining.merge_timeout_secs".into(),
                detail: "timeout must be > 0 when set".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }
        Ok(())
    }

    /// Convenience: load, expand, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// The ledger path, defaulting to `statistics.csv` under the output root.
    pub fn ledger_path(&self) -> PathBuf {
        self.output
            .ledger
            .clone()
            .unwrap_or_else(|| self.output.root.join(LEDGER_FILE_NAME))
    }

    pub fn merge_timeout(&self) -> Option<Duration> {
        self.mining.merge_timeout_secs.map(Duration::from_secs)
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# mergemine configuration

[repository]
path = "~/repos/javaparser"
# url = "https://github.com/javaparser/javaparser.git"  # cloned into `path` if missing
# branch = "master"                                      # defaults to HEAD

[output]
root = "~/merges/javaparser"
# ledger = "~/merges/javaparser/statistics.csv"
clean = true

[mining]
threshold = 1
suffixes = [".java"]
# ignore_patterns = ["**/generated/**"]
engine = "git"            # "git" (git merge-file) or "diffy" (in-process)
# merge_timeout_secs = 30

[logging]
level = "info"
# file = "~/merges/javaparser.log"
"#
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
[repository]
path = "/srv/repos/project"
url = "https://example.com/project.git"
branch = "develop"

[output]
root = "/srv/merges/project"
clean = false

[mining]
threshold = 3
suffixes = [".java", ".kt"]
ignore_patterns = ["**/generated/**"]
engine = "diffy"
merge_timeout_secs = 10

[logging]
level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: MinerConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.repository.path, PathBuf::from("/srv/repos/project"));
        assert_eq!(config.repository.branch.as_deref(), Some("develop"));
        assert!(!config.output.clean);
        assert_eq!(config.mining.threshold, 3);
        assert_eq!(config.mining.suffixes.len(), 2);
        assert_eq!(config.mining.engine, EngineKind::Diffy);
        assert_eq!(config.merge_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.ledger_path(), PathBuf::from("/srv/merges/project/statistics.csv"));
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults_from_minimal_config() {
        let config: MinerConfig = toml::from_str("[repository]\npath = \"repo\"\n").unwrap();
        assert_eq!(config.mining.threshold, 1);
        assert!(config.mining.suffixes.is_empty());
        assert_eq!(config.mining.engine, EngineKind::Git);
        assert!(config.output.clean);
        assert_eq!(config.output.root, PathBuf::from("merge-scenarios"));
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_default_template_parses_and_validates() {
        let mut config: MinerConfig = toml::from_str(MinerConfig::default_template()).unwrap();
        config.expand_paths();
        config.validate().unwrap();
        assert_eq!(config.mining.suffixes, vec![".java".to_string()]);
    }

    #[test]
    fn test_validation_failures() {
        let base: MinerConfig = toml::from_str(sample_toml()).unwrap();

        let mut c = base.clone();
        c.repository.path = PathBuf::new();
        assert!(matches!(c.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "repository.path"));

        let mut c = base.clone();
        c.mining.threshold = 0;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.mining.suffixes = vec!["".into()];
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.logging.level = "loud".into();
        assert!(c.validate().is_err());

        let mut c = base;
        c.mining.merge_timeout_secs = Some(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(matches!(
            MinerConfig::load_from_file("/nonexistent/mergemine.toml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_load_and_resolve_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergemine.toml");
        std::fs::write(&path, sample_toml()).unwrap();
        let config = MinerConfig::load_and_resolve(&path).unwrap();
        assert_eq!(config.mining.threshold, 3);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("/abs/path"));
        assert_eq!(expanded, PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/x")), home.join("x"));
        }
    }
}
