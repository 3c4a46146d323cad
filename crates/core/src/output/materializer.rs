//! Persisting accepted scenarios.

use tracing::{debug, info};

use super::ledger::{LedgerRow, LedgerWriter};
use super::{write_artifact, ArtifactKind, OutputLayout};
use crate::errors::OutputError;
use crate::scenario::{Extraction, MergeScenario, ScenarioFilter};

/// Applies the scenario threshold and writes accepted scenarios to disk.
pub struct Materializer {
    layout: OutputLayout,
    ledger: LedgerWriter,
    filter: ScenarioFilter,
}

impl Materializer {
    pub fn new(layout: OutputLayout, ledger: LedgerWriter, filter: ScenarioFilter) -> Self {
        Self { layout, ledger, filter }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn filter(&self) -> ScenarioFilter {
        self.filter
    }

    /// Record `extraction` if the filter accepts it. Returns whether it did.
    ///
    /// All artifacts of every file are written before the scenario's single
    /// ledger row is appended.
    pub fn process(
        &mut self,
        scenario: &MergeScenario,
        extraction: &Extraction,
    ) -> Result<bool, OutputError> {
        if !self.filter.accepts(extraction) {
            debug!(
                merge = %scenario.merge,
                conflicts = extraction.total_conflict_blocks,
                threshold = self.filter.threshold(),
                "scenario below threshold"
            );
            return Ok(false);
        }

        let merge = scenario.merge.to_string();
        for file in &extraction.files {
            let record = &file.record;
            let artifacts = [
                (ArtifactKind::Ancestor, record.base.as_deref()),
                (ArtifactKind::Ours, record.ours.as_deref()),
                (ArtifactKind::Theirs, record.theirs.as_deref()),
                (ArtifactKind::RecomputedMerge, Some(file.outcome.merged.as_slice())),
            ];
            for (kind, content) in artifacts {
                write_artifact(&self.layout.artifact_path(&merge, kind, &record.path), content)?;
            }
            if let Some(resolved) = record.resolved.as_deref() {
                let path = self.layout.artifact_path(&merge, ArtifactKind::HumanResolved, &record.path);
                write_artifact(&path, Some(resolved))?;
            }
        }

        let row = LedgerRow {
            merge,
            ours: scenario.ours.to_string(),
            theirs: scenario.theirs.to_string(),
            base: scenario.base.map(|b| b.to_string()),
            conflict_counts: extraction.conflict_counts(),
            paths: extraction.paths(),
        };
        self.ledger.append(&row)?;
        info!(
            merge = %row.merge,
            files = row.file_count(),
            conflicts = extraction.total_conflict_blocks,
            "recorded merge scenario"
        );
        Ok(true)
    }
}
