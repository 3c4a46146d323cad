//! Merge scenarios and their conflicting paths.
//!
//! A [`MergeScenario`] is a merge commit with its two parents and their merge
//! base. The [`ScenarioExtractor`] turns the paths the backend could not
//! merge into [`ExtractedFile`]s; the [`ScenarioFilter`] then decides whether
//! the scenario as a whole is worth recording.

pub mod extractor;
pub mod filter;

use git2::Oid;

use crate::merge::MergeOutcome;

pub use extractor::ScenarioExtractor;
pub use filter::ScenarioFilter;

/// How many leading bytes are inspected for NUL when sniffing binary content.
const BINARY_SNIFF_LEN: usize = 8000;

/// A merge commit and the three commits a replay of it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeScenario {
    pub merge: Oid,
    /// First parent.
    pub ours: Oid,
    /// Second parent.
    pub theirs: Oid,
    /// Merge base of `ours` and `theirs`; `None` for unrelated histories.
    pub base: Option<Oid>,
}

impl MergeScenario {
    /// Build a scenario from a commit's parent list. Returns `None` for
    /// commits with fewer than two parents; parents beyond the second are
    /// ignored.
    pub fn from_parents(merge: Oid, parents: &[Oid], base: Option<Oid>) -> Option<Self> {
        match parents {
            [ours, theirs, ..] => Some(Self { merge, ours: *ours, theirs: *theirs, base }),
            _ => None,
        }
    }
}

/// The recovered content of one conflicting path.
///
/// `None` means the file did not exist on that side (or could not be read).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictingPath {
    pub path: String,
    pub base: Option<Vec<u8>>,
    pub ours: Option<Vec<u8>>,
    pub theirs: Option<Vec<u8>>,
    /// Content committed at the merge commit itself.
    pub resolved: Option<Vec<u8>>,
}

impl ConflictingPath {
    /// `true` if the base exists and holds something other than whitespace.
    pub fn has_meaningful_base(&self) -> bool {
        self.base
            .as_deref()
            .is_some_and(|b| !b.iter().all(|c| c.is_ascii_whitespace()))
    }

    /// `true` if exactly one side deleted the file and the other side's
    /// content differs from the base.
    pub fn is_modify_delete(&self) -> bool {
        match (&self.ours, &self.theirs) {
            (None, Some(present)) | (Some(present), None) => {
                self.base.as_deref() != Some(present.as_slice())
            }
            _ => false,
        }
    }

    /// `true` if any side looks like binary content.
    pub fn is_binary(&self) -> bool {
        [&self.base, &self.ours, &self.theirs]
            .into_iter()
            .flatten()
            .any(|content| looks_binary(content))
    }
}

fn looks_binary(content: &[u8]) -> bool {
    content[..content.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

/// An accepted conflicting path with its recomputed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub record: ConflictingPath,
    pub outcome: MergeOutcome,
}

/// Everything extracted from one merge scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Sum of the accepted files' conflict blocks.
    pub total_conflict_blocks: u32,
    /// Accepted files, in candidate order.
    pub files: Vec<ExtractedFile>,
    /// Unmerged text paths that passed the path filter.
    pub candidates: usize,
}

impl Extraction {
    pub fn paths(&self) -> Vec<String> {
        self.files.iter().map(|f| f.record.path.clone()).collect()
    }

    /// Per-file conflict counts, index-aligned with [`Extraction::paths`].
    pub fn conflict_counts(&self) -> Vec<u32> {
        self.files.iter().map(|f| f.outcome.conflict_blocks).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
