use std::collections::HashSet;

use crate::meme::normalize;

/// Similarity of candidate meme sets to a fixed reference set.
///
/// Scores are overlap counts, not a hard filter; craft uses them to rank
/// already-eligible candidates by closeness.
#[derive(Debug, Clone, Default)]
pub struct MemeIsometry {
    sources: HashSet<String>,
}

impl MemeIsometry {
    /// Build from the reference meme set (normalized, deduplicated).
    pub fn of(source_memes: &[String]) -> MemeIsometry {
        MemeIsometry {
            sources: source_memes
                .iter()
                .map(|m| normalize(m))
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// The empty isometry: every candidate scores 0.
    pub fn none() -> MemeIsometry {
        MemeIsometry::default()
    }

    /// Count of deduplicated candidate names present in the reference set.
    pub fn score(&self, candidates: &[String]) -> usize {
        let unique: HashSet<String> = candidates.iter().map(|m| normalize(m)).collect();
        unique.iter().filter(|m| self.sources.contains(*m)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_score_counts_overlap() {
        let iso = MemeIsometry::of(&memes(&["TROPICAL", "WILD", "COZY"]));
        assert_eq!(iso.score(&memes(&["WILD"])), 1);
        assert_eq!(iso.score(&memes(&["WILD", "TROPICAL"])), 2);
        assert_eq!(iso.score(&memes(&["URBAN"])), 0);
    }

    #[test]
    fn test_score_deduplicates_candidates() {
        let iso = MemeIsometry::of(&memes(&["WILD"]));
        assert_eq!(iso.score(&memes(&["WILD", "wild", "WILD"])), 1);
    }

    #[test]
    fn test_score_is_case_insensitive() {
        let iso = MemeIsometry::of(&memes(&["tropical"]));
        assert_eq!(iso.score(&memes(&["TROPICAL"])), 1);
    }

    #[test]
    fn test_none_scores_zero() {
        let iso = MemeIsometry::none();
        assert!(iso.is_empty());
        assert_eq!(iso.score(&memes(&["ANYTHING"])), 0);
    }
}
