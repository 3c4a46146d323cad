//! Candidate-path filtering for scenario extraction.
//!
//! [`PathFilter`] combines a file-suffix allow-list with glob ignore
//! patterns. It is applied to every unmerged path before any blob is read or
//! any merge is invoked.
//!
//! | Condition | Decision |
//! |-----------|----------|
//! | Path matches an ignore pattern | `Ignored` |
//! | Suffix allow-list is non-empty and no suffix matches | `SuffixNotAllowed` |
//! | None of the above | `Allow` |

use tracing::debug;

/// The outcome of evaluating a path against the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDecision {
    /// Extract the path.
    Allow,
    /// Path matches an ignore pattern.
    Ignored { pattern: String },
    /// Path does not end with any allowed suffix.
    SuffixNotAllowed,
}

impl PathDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Short human-readable label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Ignored { .. } => "ignored",
            Self::SuffixNotAllowed => "suffix-not-allowed",
        }
    }
}

/// Suffix allow-list plus glob ignore patterns. An empty filter allows
/// every path.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    suffixes: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl PathFilter {
    pub fn new(suffixes: Vec<String>, ignore_patterns: Vec<String>) -> Self {
        Self { suffixes, ignore_patterns }
    }

    /// A filter that allows every path.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Evaluate `rel_path` (forward-slash separated, relative to the repo root).
    pub fn evaluate(&self, rel_path: &str) -> PathDecision {
        let path = rel_path.replace('\\', "/");

        for pattern in &self.ignore_patterns {
            if glob_match::glob_match(&pattern.replace('\\', "/"), &path) {
                debug!(path = rel_path, pattern = pattern.as_str(), "path matches ignore pattern");
                return PathDecision::Ignored { pattern: pattern.clone() };
            }
        }

        if !self.suffixes.is_empty() && !self.suffixes.iter().any(|s| path.ends_with(s.as_str())) {
            return PathDecision::SuffixNotAllowed;
        }

        PathDecision::Allow
    }

    pub fn allows(&self, rel_path: &str) -> bool {
        self.evaluate(rel_path).is_allowed()
    }

    pub fn has_constraints(&self) -> bool {
        !self.suffixes.is_empty() || !self.ignore_patterns.is_empty()
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

impl From<&crate::config::MiningConfig> for PathFilter {
    fn from(mining: &crate::config::MiningConfig) -> Self {
        Self::new(mining.suffixes.clone(), mining.ignore_patterns.clone())
    }
}
