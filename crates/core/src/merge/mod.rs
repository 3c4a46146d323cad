//! Three-way merge invocation.
//!
//! A [`MergeEngine`] takes base/ours/theirs buffers (any of which may be
//! absent) and returns the merged text with diff3-style conflict markers plus
//! the number of conflict blocks. Two engines exist:
//!
//! - [`GitMergeFile`] runs `git merge-file --diff3` on scratch files and
//!   takes the process exit code as the conflict count.
//! - [`DiffyMerge`] merges in process with `diffy` and counts marker blocks.
//!
//! Engines report exactly what the underlying algorithm reports. Deciding
//! whether an outcome is a real conflict is the extractor's job.

pub mod diffy_merge;
pub mod git_merge_file;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::MergeError;

pub use diffy_merge::DiffyMerge;
pub use git_merge_file::{git_available, GitMergeFile, ScratchSpace};

/// Marker opening a conflict block.
pub const OURS_MARKER: &[u8] = b"<<<<<<<";
/// Marker separating the base section in diff3 output.
pub const BASE_MARKER: &[u8] = b"|||||||";
/// Marker separating ours from theirs.
pub const SEPARATOR_MARKER: &[u8] = b"=======";
/// Marker closing a conflict block.
pub const THEIRS_MARKER: &[u8] = b">>>>>>>";

/// The result of one three-way merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged content; contains conflict markers when `conflict_blocks > 0`.
    pub merged: Vec<u8>,
    /// Number of conflict blocks. Zero means the merge resolved cleanly.
    pub conflict_blocks: u32,
}

/// A three-way text merge algorithm.
pub trait MergeEngine {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Merge `ours` and `theirs` against `base`. `None` inputs are merged as
    /// empty files.
    fn merge(
        &self,
        base: Option<&[u8]>,
        ours: Option<&[u8]>,
        theirs: Option<&[u8]>,
    ) -> Result<MergeOutcome, MergeError>;
}

/// Which merge engine to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// External `git merge-file`.
    #[default]
    Git,
    /// In-process `diffy`.
    Diffy,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Diffy => write!(f, "diffy"),
        }
    }
}

/// Construct the engine selected by `kind`.
///
/// `timeout` only applies to the external tool.
pub fn build_engine(
    kind: EngineKind,
    timeout: Option<Duration>,
) -> Result<Box<dyn MergeEngine>, MergeError> {
    match kind {
        EngineKind::Git => Ok(Box::new(GitMergeFile::new(timeout)?)),
        EngineKind::Diffy => Ok(Box::new(DiffyMerge)),
    }
}

/// Count the conflict blocks in diff3-style merged output.
pub fn count_conflict_blocks(merged: &[u8]) -> u32 {
    merged
        .split(|b| *b == b'\n')
        .filter(|line| line.starts_with(OURS_MARKER))
        .count() as u32
}

/// Render the whole file as a single conflict block.
///
/// Used for modify/delete divergences the merge algorithm resolved without
/// markers; the absent side contributes an empty section.
pub fn whole_file_conflict(base: &[u8], ours: Option<&[u8]>, theirs: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    push_section(&mut out, OURS_MARKER, b" ours", ours.unwrap_or_default());
    push_section(&mut out, BASE_MARKER, b" base", base);
    push_section(&mut out, SEPARATOR_MARKER, b"", theirs.unwrap_or_default());
    out.extend_from_slice(THEIRS_MARKER);
    out.extend_from_slice(b" theirs\n");
    out
}

fn push_section(out: &mut Vec<u8>, marker: &[u8], label: &[u8], body: &[u8]) {
    out.extend_from_slice(marker);
    out.extend_from_slice(label);
    out.push(b'\n');
    out.extend_from_slice(body);
    if !body.is_empty() && !body.ends_with(b"\n") {
        out.push(b'\n');
    }
}
