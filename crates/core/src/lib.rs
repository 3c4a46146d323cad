//! mergemine core library.
//!
//! Mines the merge commits of a git repository for merge-conflict scenarios:
//! it replays each merge, recovers the base/ours/theirs content of every path
//! the replay could not merge, recomputes a conflict-marked merge of it, and
//! records the scenarios that meet a threshold as on-disk artifacts plus one
//! ledger row each.

pub mod config;
pub mod errors;
pub mod git;
pub mod merge;
pub mod output;
pub mod path_filter;
pub mod pipeline;
pub mod scenario;

#[cfg(test)]
mod test_repo;

// Re-exports for convenience.
pub use config::MinerConfig;
pub use git::GitRepo;
pub use merge::{build_engine, EngineKind, MergeEngine};
pub use output::{LedgerWriter, Materializer, OutputLayout, RunSummary};
pub use path_filter::PathFilter;
pub use pipeline::{CommitSource, Pipeline, RunStats};
pub use scenario::{MergeScenario, ScenarioFilter};
