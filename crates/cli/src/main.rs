//! mergemine command-line tool.
//!
//! Mines a repository's merge commits for conflict scenarios using one of
//! three drivers (full history, an explicit commit list, or a ledger replay),
//! and generates / validates configuration files.

mod mine;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use mergemine_core::config::MinerConfig;
use mergemine_core::merge::EngineKind;
use mergemine_core::pipeline::CommitSource;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// mergemine: mine merge-conflict scenarios from git history.
#[derive(Parser, Debug)]
#[command(
    name = "mergemine",
    version,
    about = "Mine merge-conflict scenarios from the history of a git repository"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override values from the configuration file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Local repository path (cloned from --url if missing).
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Remote to clone when the repository path does not exist.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Output root for scenario artifacts.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Ledger file (default: statistics.csv under the output root).
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// Minimum conflict blocks per recorded scenario.
    #[arg(long, global = true)]
    threshold: Option<u32>,

    /// Only extract paths with this suffix (repeatable).
    #[arg(long = "suffix", global = true)]
    suffixes: Vec<String>,

    /// Skip paths matching this glob (repeatable).
    #[arg(long = "ignore", global = true)]
    ignore_patterns: Vec<String>,

    /// Merge engine used to recompute conflicts.
    #[arg(long, global = true, value_enum)]
    engine: Option<EngineArg>,

    /// Kill the external merge tool after this many seconds.
    #[arg(long, global = true)]
    merge_timeout: Option<u64>,

    /// Keep existing output and append to the existing ledger.
    #[arg(long, global = true)]
    keep_existing: bool,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mine every merge commit reachable from a branch.
    History {
        /// Branch to walk (default: the configured branch, then HEAD).
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Mine an explicit list of merge commits.
    Commits {
        /// Commit ids or revision expressions.
        #[arg(required_unless_present = "from_file")]
        ids: Vec<String>,

        /// Read commit ids from a file, one per line (`#` starts a comment).
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Re-mine the scenarios recorded in an existing ledger.
    Replay {
        /// Ledger to replay.
        ledger: PathBuf,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(default_value = "./mergemine.toml")]
        file: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    /// External `git merge-file`.
    Git,
    /// In-process diff3 merge.
    Diffy,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Git => EngineKind::Git,
            EngineArg::Diffy => EngineKind::Diffy,
        }
    }
}

const DEFAULT_CONFIG_PATH: &str = "./mergemine.toml";

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let source = match cli.command {
        Commands::Init { file } => return cmd_init(&file),
        Commands::Validate => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            return cmd_validate(&path);
        }
        Commands::History { branch } => CommitSource::FullHistory { branch },
        Commands::Commits { ids, from_file } => {
            CommitSource::Explicit(collect_commit_ids(ids, from_file.as_deref())?)
        }
        Commands::Replay { ledger } => CommitSource::Ledger(ledger),
    };

    let config = load_config(cli.config.as_deref(), &cli.overrides)?;
    let _guard = init_logging(&config)?;

    // The configured branch applies when the command line names none.
    let source = match source {
        CommitSource::FullHistory { branch: None } => {
            CommitSource::FullHistory { branch: config.repository.branch.clone() }
        }
        other => other,
    };

    mine::cmd_mine(&config, &source)
}

// ---------------------------------------------------------------------------
// Config & logging helpers
// ---------------------------------------------------------------------------

/// Load the config file (if any), apply command-line overrides, expand
/// paths, and validate.
fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<MinerConfig> {
    let mut config = match path {
        Some(path) => {
            MinerConfig::load_from_file(path).context("failed to load configuration file")?
        }
        None => MinerConfig::default(),
    };
    apply_overrides(&mut config, overrides);
    config.expand_paths();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn apply_overrides(config: &mut MinerConfig, o: &Overrides) {
    if let Some(repo) = &o.repo {
        config.repository.path = repo.clone();
    }
    if let Some(url) = &o.url {
        config.repository.url = Some(url.clone());
    }
    if let Some(output) = &o.output {
        config.output.root = output.clone();
    }
    if let Some(ledger) = &o.ledger {
        config.output.ledger = Some(ledger.clone());
    }
    if let Some(threshold) = o.threshold {
        config.mining.threshold = threshold;
    }
    if !o.suffixes.is_empty() {
        config.mining.suffixes = o.suffixes.clone();
    }
    if !o.ignore_patterns.is_empty() {
        config.mining.ignore_patterns = o.ignore_patterns.clone();
    }
    if let Some(engine) = o.engine {
        config.mining.engine = engine.into();
    }
    if let Some(secs) = o.merge_timeout {
        config.mining.merge_timeout_secs = Some(secs);
    }
    if o.keep_existing {
        config.output.clean = false;
    }
    if let Some(level) = &o.log_level {
        config.logging.level = level.clone();
    }
    if let Some(file) = &o.log_file {
        config.logging.file = Some(file.clone());
    }
}

/// Initialise tracing. `RUST_LOG` takes precedence over the configured
/// level. The returned guard must live until the process exits so the log
/// file is flushed.
fn init_logging(config: &MinerConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.logging.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Merge positional ids with the ids listed in `from_file`.
fn collect_commit_ids(mut ids: Vec<String>, from_file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = from_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read commit list {}", path.display()))?;
        ids.extend(parse_commit_list(&contents));
    }
    if ids.is_empty() {
        anyhow::bail!("no commit ids given");
    }
    Ok(ids)
}

fn parse_commit_list(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, MinerConfig::default_template())
        .context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Point [repository] at the repository to mine");
    println!("  2. Validate with: mergemine validate --config {}", output.display());
    println!("  3. Mine it:       mergemine history --config {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        MinerConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config.expand_paths();
    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  Repository    : {}", config.repository.path.display());
    println!(
        "  Clone from    : {}",
        config.repository.url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Branch        : {}",
        config.repository.branch.as_deref().unwrap_or("HEAD")
    );
    println!("  Output root   : {}", config.output.root.display());
    println!("  Ledger        : {}", config.ledger_path().display());
    println!("  Threshold     : {}", config.mining.threshold);
    println!("  Engine        : {}", config.mining.engine);
    println!(
        "  Suffixes      : {}",
        if config.mining.suffixes.is_empty() {
            "(all files)".to_string()
        } else {
            config.mining.suffixes.join(", ")
        }
    );
    if !config.repository.path.exists() && config.repository.url.is_none() {
        println!();
        println!(
            "{}",
            style::warn("repository path does not exist and no url is set to clone from")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_history_with_overrides() {
        let cli = Cli::try_parse_from([
            "mergemine",
            "history",
            "--repo",
            "/tmp/repo",
            "--threshold",
            "2",
            "--suffix",
            ".java",
            "--suffix",
            ".kt",
            "--engine",
            "diffy",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::History { branch: None }));

        let config = load_config(None, &cli.overrides).unwrap();
        assert_eq!(config.repository.path, PathBuf::from("/tmp/repo"));
        assert_eq!(config.mining.threshold, 2);
        assert_eq!(config.mining.suffixes, vec![".java".to_string(), ".kt".to_string()]);
        assert_eq!(config.mining.engine, EngineKind::Diffy);
        assert!(config.output.clean);
    }

    #[test]
    fn test_commits_requires_ids_or_file() {
        assert!(Cli::try_parse_from(["mergemine", "commits"]).is_err());
        assert!(Cli::try_parse_from(["mergemine", "commits", "abc123"]).is_ok());
        assert!(Cli::try_parse_from(["mergemine", "commits", "--from-file", "ids.txt"]).is_ok());
    }

    #[test]
    fn test_missing_repository_fails_validation() {
        let overrides = Overrides::default();
        assert!(load_config(None, &overrides).is_err());
    }

    #[test]
    fn test_keep_existing_disables_clean() {
        let overrides = Overrides {
            repo: Some(PathBuf::from("repo")),
            keep_existing: true,
            ..Default::default()
        };
        let config = load_config(None, &overrides).unwrap();
        assert!(!config.output.clean);
    }

    #[test]
    fn test_parse_commit_list_skips_comments_and_blanks() {
        let ids: Vec<String> =
            parse_commit_list("abc123\n\n# header\ndef456  # trailing\n  \n").collect();
        assert_eq!(ids, vec!["abc123".to_string(), "def456".to_string()]);
    }

    #[test]
    fn test_collect_commit_ids_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "aaaa\nbbbb\n").unwrap();
        let ids = collect_commit_ids(vec!["cccc".into()], Some(&path)).unwrap();
        assert_eq!(ids, vec!["cccc", "aaaa", "bbbb"]);
    }

    #[test]
    fn test_init_writes_valid_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergemine.toml");
        cmd_init(&path).unwrap();
        assert!(cmd_init(&path).is_err());
        cmd_validate(&path).unwrap();
    }
}
