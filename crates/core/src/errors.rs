//! Error types for the mergemine core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Content retrieval never produces an error: a blob that cannot be read is
//! reported as absent (`None`) by the repository adapter.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from repository access (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Cloning the remote repository failed.
    #[error("failed to clone '{url}': {detail}")]
    CloneFailed { url: String, detail: String },
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from the three-way merge invoker.
///
/// All of these indicate a broken environment rather than bad data, so the
/// pipeline treats them as fatal.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The merge tool binary was not found on `$PATH`.
    #[error("merge tool not found: {0}")]
    ToolNotFound(String),

    /// The merge tool ran but reported an error instead of a conflict count.
    #[error("merge tool failed (exit {exit_code}): {stderr}")]
    ToolFailed { exit_code: i32, stderr: String },

    /// The merge tool was killed by a signal.
    #[error("merge tool terminated by signal")]
    Terminated,

    /// The merge tool did not finish within the configured timeout.
    #[error("merge tool timed out after {0}s")]
    Timeout(u64),

    /// Scratch files could not be written or read back, or the tool could
    /// not be waited on.
    #[error("merge I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Output errors
// ---------------------------------------------------------------------------

/// Errors while writing artifacts under the output root.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A directory or file under the output root could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The output root could not be cleared before a fresh run.
    #[error("failed to clear output root '{path}': {source}")]
    Clear {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Appending the scenario's ledger row failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Ledger errors
// ---------------------------------------------------------------------------

/// Errors from reading or appending the scenario ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger file could not be opened, read or appended to.
    #[error("ledger I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A data row did not have the expected columns.
    #[error("malformed ledger row {line}: {detail}")]
    MalformedRow { line: usize, detail: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = GitError::RepositoryNotFound("/tmp/repo".into());
        assert_eq!(err.to_string(), "git repository not found at '/tmp/repo'");

        let err = MergeError::ToolFailed {
            exit_code: 255,
            stderr: "error: Cannot merge binary files".into(),
        };
        assert!(err.to_string().contains("exit 255"));

        let err = LedgerError::MalformedRow {
            line: 3,
            detail: "expected at least 4 columns".into(),
        };
        assert!(err.to_string().contains("row 3"));

        let err = ConfigError::InvalidValue {
            field: "mining.threshold".into(),
            detail: "must be >= 1".into(),
        };
        assert!(err.to_string().contains("mining.threshold"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let merge_err = MergeError::ToolNotFound("git".into());
        let core_err: CoreError = merge_err.into();
        assert!(matches!(core_err, CoreError::Merge(_)));

        let ledger_err = LedgerError::MalformedRow {
            line: 1,
            detail: "empty".into(),
        };
        let output_err: OutputError = ledger_err.into();
        let core_err: CoreError = output_err.into();
        assert!(matches!(core_err, CoreError::Output(OutputError::Ledger(_))));
    }
}
