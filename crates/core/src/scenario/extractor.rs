//! Per-commit scenario extraction.

use tracing::{debug, info};

use super::{ConflictingPath, ExtractedFile, Extraction, MergeScenario};
use crate::errors::MergeError;
use crate::git::{GitRepo, StagedEntry};
use crate::merge::{count_conflict_blocks, whole_file_conflict, MergeEngine, MergeOutcome};
use crate::path_filter::PathFilter;

/// Recomputes the merge of every unmerged path of a scenario and keeps the
/// ones that are genuine three-way conflicts.
pub struct ScenarioExtractor<'a> {
    repo: &'a GitRepo,
    engine: &'a dyn MergeEngine,
    paths: &'a PathFilter,
}

impl<'a> ScenarioExtractor<'a> {
    pub fn new(repo: &'a GitRepo, engine: &'a dyn MergeEngine, paths: &'a PathFilter) -> Self {
        Self { repo, engine, paths }
    }

    /// Extract the conflicting files of `scenario` from its unmerged
    /// `staged` entries.
    ///
    /// Blob retrieval problems only make a side absent. An engine failure
    /// aborts extraction.
    pub fn extract(
        &self,
        scenario: &MergeScenario,
        staged: Vec<StagedEntry>,
    ) -> Result<Extraction, MergeError> {
        let mut extraction = Extraction::default();

        for entry in staged {
            let decision = self.paths.evaluate(&entry.path);
            if !decision.is_allowed() {
                debug!(path = %entry.path, decision = decision.label(), "path filtered out");
                continue;
            }
            let mut record = self.load(entry);
            if record.is_binary() {
                debug!(path = %record.path, "skipping binary path");
                continue;
            }
            extraction.candidates += 1;

            let outcome = self.engine.merge(
                record.base.as_deref(),
                record.ours.as_deref(),
                record.theirs.as_deref(),
            )?;
            let reported = outcome.conflict_blocks;

            let Some(outcome) = judge(&record, outcome) else {
                debug!(path = %record.path, reported, "not a three-way conflict");
                continue;
            };

            record.resolved = self.repo.content_at(scenario.merge, &record.path);
            debug!(
                path = %record.path,
                reported,
                conflicts = outcome.conflict_blocks,
                resolved = record.resolved.is_some(),
                "conflicting path accepted"
            );
            extraction.total_conflict_blocks += outcome.conflict_blocks;
            extraction.files.push(ExtractedFile { record, outcome });
        }

        if !extraction.is_empty() {
            info!(
                merge = %scenario.merge,
                candidates = extraction.candidates,
                files = extraction.files.len(),
                conflicts = extraction.total_conflict_blocks,
                "extracted merge scenario"
            );
        }
        Ok(extraction)
    }

    fn load(&self, entry: StagedEntry) -> ConflictingPath {
        let fetch = |oid: Option<git2::Oid>| oid.and_then(|oid| self.repo.blob_content(oid));
        ConflictingPath {
            base: fetch(entry.base),
            ours: fetch(entry.ours),
            theirs: fetch(entry.theirs),
            resolved: None,
            path: entry.path,
        }
    }
}

/// Decide whether `outcome` makes `record` a conflicting path, returning the
/// outcome to record if so.
///
/// - A missing or blank base never counts: add/add and similar shapes are
///   reported as conflicts by the merge only because of their layout.
/// - A modify/delete divergence always counts, with at least one block. If
///   the merge produced no markers the whole file becomes one block.
/// - Otherwise the path counts iff the merge reported a conflict block.
pub fn judge(record: &ConflictingPath, outcome: MergeOutcome) -> Option<MergeOutcome> {
    if !record.has_meaningful_base() {
        return None;
    }

    if record.is_modify_delete() {
        if count_conflict_blocks(&outcome.merged) > 0 {
            let conflict_blocks = outcome.conflict_blocks.max(1);
            return Some(MergeOutcome { conflict_blocks, ..outcome });
        }
        let base = record.base.as_deref().unwrap_or_default();
        let merged = whole_file_conflict(base, record.ours.as_deref(), record.theirs.as_deref());
        return Some(MergeOutcome { merged, conflict_blocks: outcome.conflict_blocks.max(1) });
    }

    (outcome.conflict_blocks > 0).then_some(outcome)
}
