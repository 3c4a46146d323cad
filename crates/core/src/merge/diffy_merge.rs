//! In-process three-way merge backed by `diffy`.

use tracing::debug;

use super::{count_conflict_blocks, MergeEngine, MergeOutcome};
use crate::errors::MergeError;

/// Stateless in-process merge engine.
///
/// `diffy` renders conflicts in diff3 style (`<<<<<<< ours`,
/// `||||||| original`, `=======`, `>>>>>>> theirs`); the conflict count is
/// the number of opening markers in its output.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffyMerge;

impl MergeEngine for DiffyMerge {
    fn name(&self) -> &'static str {
        "diffy"
    }

    fn merge(
        &self,
        base: Option<&[u8]>,
        ours: Option<&[u8]>,
        theirs: Option<&[u8]>,
    ) -> Result<MergeOutcome, MergeError> {
        let base = base.unwrap_or_default();
        let ours = ours.unwrap_or_default();
        let theirs = theirs.unwrap_or_default();

        let outcome = match diffy::merge_bytes(base, ours, theirs) {
            Ok(merged) => MergeOutcome { merged, conflict_blocks: 0 },
            Err(conflicted) => {
                let conflict_blocks = count_conflict_blocks(&conflicted).max(1);
                MergeOutcome { merged: conflicted, conflict_blocks }
            }
        };
        debug!(conflicts = outcome.conflict_blocks, "diffy merge finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_merge_of_disjoint_changes() {
        let base = b"aaa\nbbb\nccc\nddd\neee\nfff\nggg\n";
        let ours = b"AAA\nbbb\nccc\nddd\neee\nfff\nggg\n";
        let theirs = b"aaa\nbbb\nccc\nddd\neee\nfff\nGGG\n";
        let outcome = DiffyMerge.merge(Some(base), Some(ours), Some(theirs)).unwrap();
        assert_eq!(outcome.conflict_blocks, 0);
        assert_eq!(outcome.merged, b"AAA\nbbb\nccc\nddd\neee\nfff\nGGG\n");
    }

    #[test]
    fn test_conflicting_change_is_counted() {
        let base = b"line1\noriginal\nline3\n";
        let ours = b"line1\nours_version\nline3\n";
        let theirs = b"line1\ntheirs_version\nline3\n";
        let outcome = DiffyMerge.merge(Some(base), Some(ours), Some(theirs)).unwrap();
        assert_eq!(outcome.conflict_blocks, 1);
        let text = String::from_utf8(outcome.merged).unwrap();
        assert!(text.contains("<<<<<<<"));
        assert!(text.contains("ours_version"));
        assert!(text.contains("theirs_version"));
        assert!(text.contains(">>>>>>>"));
    }

    #[test]
    fn test_identical_changes_merge_cleanly() {
        let outcome = DiffyMerge.merge(Some(b"old\n"), Some(b"new\n"), Some(b"new\n")).unwrap();
        assert_eq!(outcome.conflict_blocks, 0);
        assert_eq!(outcome.merged, b"new\n");
    }

    #[test]
    fn test_absent_inputs_are_empty() {
        let outcome = DiffyMerge.merge(None, None, None).unwrap();
        assert_eq!(outcome.conflict_blocks, 0);
        assert!(outcome.merged.is_empty());
    }
}
