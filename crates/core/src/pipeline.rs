//! Traversal drivers.
//!
//! A [`Pipeline`] pulls merge commits from a [`CommitSource`] and pushes each
//! one through the same steps:
//!
//! 1. Build the [`MergeScenario`] (parents, merge base).
//! 2. Ask the repository for the paths its tree merge left unmerged.
//! 3. Extract and judge each path with the [`ScenarioExtractor`].
//! 4. Hand the extraction to the [`Materializer`], which applies the
//!    threshold and writes artifacts plus one ledger row.
//!
//! One scenario is finished before the next one starts. Problems confined to
//! one commit (unknown id, too few parents, unreadable trees) are logged and
//! skipped; merge-engine and output failures abort the run.

use std::path::PathBuf;

use git2::Oid;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::errors::CoreError;
use crate::git::GitRepo;
use crate::merge::MergeEngine;
use crate::output::ledger::{dedup_by_merge, read_ledger, LedgerRow};
use crate::output::Materializer;
use crate::path_filter::PathFilter;
use crate::scenario::{MergeScenario, ScenarioExtractor};

/// Where merge commits come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSource {
    /// Every merge commit reachable from a branch tip (`None` = `HEAD`).
    FullHistory { branch: Option<String> },
    /// An explicit list of commit ids or revision expressions.
    Explicit(Vec<String>),
    /// The scenarios recorded in an existing ledger, replayed with their
    /// recorded parents and base.
    Ledger(PathBuf),
}

impl CommitSource {
    /// Short name used in logs and the run summary.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::FullHistory { .. } => "history",
            Self::Explicit(_) => "commits",
            Self::Ledger(_) => "ledger",
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Merge scenarios considered.
    pub merge_commits: usize,
    /// Scenarios with at least one conflicting path.
    pub conflicted_scenarios: usize,
    /// Scenarios that met the threshold and were recorded.
    pub accepted_scenarios: usize,
    /// Conflicting paths recorded across accepted scenarios.
    pub accepted_files: usize,
    /// Conflict blocks recorded across accepted scenarios.
    pub conflict_blocks: u64,
    /// Commits skipped with a diagnostic.
    pub skipped_commits: usize,
}

/// Progress notification emitted after each scenario.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub merge: Oid,
    pub accepted: bool,
    pub merge_commits: usize,
    pub accepted_scenarios: usize,
}

/// The shared extraction/materialization core behind all drivers.
pub struct Pipeline<'a> {
    repo: &'a GitRepo,
    extractor: ScenarioExtractor<'a>,
    materializer: Materializer,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        repo: &'a GitRepo,
        engine: &'a dyn MergeEngine,
        paths: &'a PathFilter,
        materializer: Materializer,
    ) -> Self {
        Self { repo, extractor: ScenarioExtractor::new(repo, engine, paths), materializer }
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Run the driver for `source` to completion.
    pub fn run(&mut self, source: &CommitSource) -> Result<RunStats, CoreError> {
        self.run_with_progress(source, |_| {})
    }

    /// Like [`Pipeline::run`], calling `on_progress` after every scenario.
    #[instrument(skip(self, on_progress), fields(driver = source.driver_name()))]
    pub fn run_with_progress<F>(
        &mut self,
        source: &CommitSource,
        mut on_progress: F,
    ) -> Result<RunStats, CoreError>
    where
        F: FnMut(&Progress),
    {
        let mut stats = RunStats::default();
        match source {
            CommitSource::FullHistory { branch } => {
                self.run_history(branch.as_deref(), &mut stats, &mut on_progress)?
            }
            CommitSource::Explicit(ids) => self.run_explicit(ids, &mut stats, &mut on_progress)?,
            CommitSource::Ledger(path) => self.run_ledger(path, &mut stats, &mut on_progress)?,
        }
        info!(
            merge_commits = stats.merge_commits,
            conflicted = stats.conflicted_scenarios,
            accepted = stats.accepted_scenarios,
            files = stats.accepted_files,
            skipped = stats.skipped_commits,
            "run complete"
        );
        Ok(stats)
    }

    fn run_history(
        &mut self,
        branch: Option<&str>,
        stats: &mut RunStats,
        on_progress: &mut dyn FnMut(&Progress),
    ) -> Result<(), CoreError> {
        let repo = self.repo;
        let tip = repo.resolve_branch(branch)?;
        info!(%tip, "walking history");

        for oid in repo.walk_history(tip)? {
            let oid = oid?;
            let parents = repo.parents(oid)?;
            if parents.len() < 2 {
                continue;
            }
            let base = repo.merge_base(parents[0], parents[1])?;
            if let Some(scenario) = MergeScenario::from_parents(oid, &parents, base) {
                self.process(&scenario, stats, on_progress)?;
            }
        }
        Ok(())
    }

    fn run_explicit(
        &mut self,
        ids: &[String],
        stats: &mut RunStats,
        on_progress: &mut dyn FnMut(&Progress),
    ) -> Result<(), CoreError> {
        let repo = self.repo;
        for id in ids {
            let oid = match repo.resolve_commit(id) {
                Ok(oid) => oid,
                Err(e) => {
                    warn!(commit = %id, error = %e, "skipping unknown commit");
                    stats.skipped_commits += 1;
                    continue;
                }
            };
            let parents = repo.parents(oid)?;
            if parents.len() < 2 {
                warn!(commit = %oid, parents = parents.len(), "skipping commit: not a merge commit");
                stats.skipped_commits += 1;
                continue;
            }
            let base = repo.merge_base(parents[0], parents[1])?;
            if let Some(scenario) = MergeScenario::from_parents(oid, &parents, base) {
                self.process(&scenario, stats, on_progress)?;
            }
        }
        Ok(())
    }

    fn run_ledger(
        &mut self,
        path: &std::path::Path,
        stats: &mut RunStats,
        on_progress: &mut dyn FnMut(&Progress),
    ) -> Result<(), CoreError> {
        let rows = dedup_by_merge(read_ledger(path)?);
        info!(path = %path.display(), rows = rows.len(), "replaying ledger");

        for row in rows {
            match self.scenario_from_row(&row) {
                Ok(scenario) => self.process(&scenario, stats, on_progress)?,
                Err(e) => {
                    warn!(merge = %row.merge, error = %e, "skipping ledger row");
                    stats.skipped_commits += 1;
                }
            }
        }
        Ok(())
    }

    /// Resolve a ledger row's recorded commits without recomputing the base.
    fn scenario_from_row(&self, row: &LedgerRow) -> Result<MergeScenario, CoreError> {
        Ok(MergeScenario {
            merge: self.repo.resolve_commit(&row.merge)?,
            ours: self.repo.resolve_commit(&row.ours)?,
            theirs: self.repo.resolve_commit(&row.theirs)?,
            base: row.base.as_deref().map(|b| self.repo.resolve_commit(b)).transpose()?,
        })
    }

    fn process(
        &mut self,
        scenario: &MergeScenario,
        stats: &mut RunStats,
        on_progress: &mut dyn FnMut(&Progress),
    ) -> Result<(), CoreError> {
        stats.merge_commits += 1;

        let staged = match self.repo.staged_triples(scenario.base, scenario.ours, scenario.theirs) {
            Ok(staged) => staged,
            Err(e) => {
                warn!(merge = %scenario.merge, error = %e, "skipping scenario: tree merge failed");
                stats.skipped_commits += 1;
                return Ok(());
            }
        };

        let extraction = self.extractor.extract(scenario, staged)?;
        if !extraction.is_empty() {
            stats.conflicted_scenarios += 1;
        }

        let accepted = self.materializer.process(scenario, &extraction)?;
        if accepted {
            stats.accepted_scenarios += 1;
            stats.accepted_files += extraction.files.len();
            stats.conflict_blocks += u64::from(extraction.total_conflict_blocks);
        }

        on_progress(&Progress {
            merge: scenario.merge,
            accepted,
            merge_commits: stats.merge_commits,
            accepted_scenarios: stats.accepted_scenarios,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_names() {
        assert_eq!(CommitSource::FullHistory { branch: None }.driver_name(), "history");
        assert_eq!(CommitSource::Explicit(vec![]).driver_name(), "commits");
        assert_eq!(CommitSource::Ledger(PathBuf::from("x.csv")).driver_name(), "ledger");
    }
}
