//! Dedup & merge of insight candidates.
//!
//! Pure and I/O-free so the caller's exclusion policy can change without
//! touching it: callers enforce single-run-per-subject, this function only
//! combines lists.

use std::collections::HashSet;

use colloquy_core::InsightCandidate;

/// Result of merging newly parsed candidates into an existing set.
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// `existing` followed by the accepted candidates.
    pub merged: Vec<InsightCandidate>,
    /// The accepted subset of `candidates` (those not already present).
    pub added: Vec<InsightCandidate>,
}

/// Merge `candidates` into `existing`, filtering by id.
///
/// Idempotent: merging the same candidates a second time yields an empty
/// `added` list.
pub fn merge(existing: &[InsightCandidate], candidates: &[InsightCandidate]) -> MergeResult {
    let seen: HashSet<&str> = existing.iter().map(|i| i.id.as_str()).collect();

    let added: Vec<InsightCandidate> = candidates
        .iter()
        .filter(|c| !seen.contains(c.id.as_str()))
        .cloned()
        .collect();

    let mut merged = existing.to_vec();
    merged.extend(added.iter().cloned());

    MergeResult { merged, added }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, title: &str) -> InsightCandidate {
        InsightCandidate {
            id: id.to_string(),
            title: title.to_string(),
            content: String::new(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_merge_into_empty() {
        let new = vec![candidate("1-0", "a"), candidate("1-1", "b")];
        let result = merge(&[], &new);
        assert_eq!(result.added.len(), 2);
        assert_eq!(result.merged.len(), 2);
    }

    #[test]
    fn test_merge_filters_known_ids() {
        let existing = vec![candidate("1-0", "a")];
        let new = vec![candidate("1-0", "a again"), candidate("1-1", "b")];

        let result = merge(&existing, &new);
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.added[0].id, "1-1");
        assert_eq!(result.merged.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![candidate("1-0", "a")];
        let new = vec![candidate("1-1", "b"), candidate("1-2", "c")];

        let first = merge(&existing, &new);
        assert_eq!(first.added.len(), 2);

        // Second call with the same candidates adds nothing.
        let second = merge(&first.merged, &new);
        assert!(second.added.is_empty());
        assert_eq!(second.merged.len(), first.merged.len());
    }

    #[test]
    fn test_merge_preserves_existing_order() {
        let existing = vec![candidate("1-0", "a"), candidate("1-1", "b")];
        let new = vec![candidate("1-2", "c")];

        let result = merge(&existing, &new);
        let ids: Vec<&str> = result.merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1-0", "1-1", "1-2"]);
    }

    #[test]
    fn test_merge_empty_candidates() {
        let existing = vec![candidate("1-0", "a")];
        let result = merge(&existing, &[]);
        assert!(result.added.is_empty());
        assert_eq!(result.merged.len(), 1);
    }
}
