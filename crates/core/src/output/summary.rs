//! End-of-run summary written next to the ledger.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::OutputError;
use crate::pipeline::RunStats;

pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// What a run did, serialized as `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Which traversal driver ran (`history`, `commits` or `ledger`).
    pub driver: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub threshold: u32,
    pub engine: String,
    pub stats: RunStats,
}

impl RunSummary {
    pub fn write_to(&self, root: &Path) -> Result<(), OutputError> {
        let path = root.join(SUMMARY_FILE_NAME);
        let json = serde_json::to_string_pretty(self).map_err(|e| OutputError::Write {
            path: path.display().to_string(),
            source: e.into(),
        })?;
        super::write_artifact(&path, Some(json.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary {
            driver: "history".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            threshold: 1,
            engine: "git".into(),
            stats: RunStats { merge_commits: 3, accepted_scenarios: 1, ..Default::default() },
        };
        summary.write_to(dir.path()).unwrap();

        let text = std::fs::read_to_string(dir.path().join(SUMMARY_FILE_NAME)).unwrap();
        let parsed: RunSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.stats.merge_commits, 3);
        assert_eq!(parsed.driver, "history");
    }
}
