//! Scenario acceptance threshold.

use super::Extraction;

/// Default minimum number of conflict blocks for a scenario to be recorded.
pub const DEFAULT_THRESHOLD: u32 = 1;

/// Accepts a scenario iff it has at least one conflicting file and its total
/// conflict-block count reaches the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioFilter {
    threshold: u32,
}

impl ScenarioFilter {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn accepts(&self, extraction: &Extraction) -> bool {
        !extraction.is_empty() && extraction.total_conflict_blocks >= self.threshold
    }
}

impl Default for ScenarioFilter {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
