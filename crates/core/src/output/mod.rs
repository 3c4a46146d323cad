//! On-disk dataset layout.
//!
//! Every artifact lives at `{root}/{merge commit}/{kind}/{relative path}`.
//! The ledger (`statistics.csv` by default) and the run summary sit directly
//! under the root.

pub mod ledger;
pub mod materializer;
pub mod summary;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::OutputError;

pub use ledger::{LedgerRow, LedgerWriter};
pub use materializer::Materializer;
pub use summary::RunSummary;

/// Default ledger file name under the output root.
pub const LEDGER_FILE_NAME: &str = "statistics.csv";

/// The five artifacts recorded per conflicting path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Ancestor,
    Ours,
    Theirs,
    RecomputedMerge,
    HumanResolved,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        Self::Ancestor,
        Self::Ours,
        Self::Theirs,
        Self::RecomputedMerge,
        Self::HumanResolved,
    ];

    /// Directory name of this kind under a scenario directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Ancestor => "ancestor",
            Self::Ours => "ours",
            Self::Theirs => "theirs",
            Self::RecomputedMerge => "recomputed-merge",
            Self::HumanResolved => "human-resolved",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Path arithmetic and housekeeping for the output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the `kind` artifact of `rel_path` in scenario `merge` goes.
    pub fn artifact_path(&self, merge: &str, kind: ArtifactKind, rel_path: &str) -> PathBuf {
        let mut path = self.root.join(merge).join(kind.dir_name());
        for component in rel_path.split('/').filter(|c| !c.is_empty()) {
            path.push(component);
        }
        path
    }

    pub fn default_ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILE_NAME)
    }

    /// Create the root, removing everything under it first when `clean`.
    pub fn prepare(&self, clean: bool) -> Result<(), OutputError> {
        if clean && self.root.exists() {
            info!(root = %self.root.display(), "clearing previous output");
            std::fs::remove_dir_all(&self.root).map_err(|source| OutputError::Clear {
                path: self.root.display().to_string(),
                source,
            })?;
        }
        create_dir(&self.root)
    }
}

/// Write `content` to `path`, creating parent directories. Absent content
/// produces an empty placeholder file.
pub fn write_artifact(path: &Path, content: Option<&[u8]>) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    std::fs::write(path, content.unwrap_or_default()).map_err(|source| OutputError::Write {
        path: path.display().to_string(),
        source,
    })
}

fn create_dir(path: &Path) -> Result<(), OutputError> {
    std::fs::create_dir_all(path).map_err(|source| OutputError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_layout() {
        let layout = OutputLayout::new("/out");
        let path = layout.artifact_path("abc123", ArtifactKind::RecomputedMerge, "src/main/Foo.java");
        assert_eq!(path, PathBuf::from("/out/abc123/recomputed-merge/src/main/Foo.java"));
        assert_eq!(layout.default_ledger_path(), PathBuf::from("/out/statistics.csv"));
    }

    #[test]
    fn test_kind_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            ArtifactKind::ALL.iter().map(|k| k.dir_name()).collect();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_prepare_clears_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        layout.prepare(true).unwrap();
        let stale = layout.root().join("stale.txt");
        std::fs::write(&stale, "x").unwrap();

        layout.prepare(false).unwrap();
        assert!(stale.exists());
        layout.prepare(true).unwrap();
        assert!(!stale.exists());
        assert!(layout.root().is_dir());
    }

    #[test]
    fn test_write_artifact_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_artifact(&path, None).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"");
        write_artifact(&path, Some(b"data")).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }
}
