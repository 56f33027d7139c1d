use crate::meme::taxonomy::MemeTaxonomy;
use crate::meme::{base, is_anti, is_unique, normalize};

/// An accumulated, taxonomy-validated set of memes for one segment.
///
/// Built once from whatever has already been chosen, then consulted with
/// `is_allowed` before each further addition. Immutable: candidates that
/// pass are accumulated by building a new stack from the grown meme set.
#[derive(Debug, Clone)]
pub struct MemeStack {
    taxonomy: MemeTaxonomy,
    memes: Vec<String>,
}

/// True when two memes cannot coexist in one stack, ignoring taxonomy.
fn violates(present: &str, candidate: &str) -> bool {
    // NAME and !NAME are mutually forbidden, in either order
    if is_anti(present) && base(present) == candidate {
        return true;
    }
    if is_anti(candidate) && base(candidate) == present {
        return true;
    }
    // $NAME accumulates at most once, even against itself
    if is_unique(present) && present == candidate {
        return true;
    }
    false
}

impl MemeStack {
    /// Build a stack from a collection of names: case-insensitive,
    /// deduplicated, insertion order preserved.
    pub fn from(taxonomy: &MemeTaxonomy, names: &[String]) -> MemeStack {
        let mut memes: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = normalize(name);
            if !name.is_empty() && !memes.contains(&name) {
                memes.push(name);
            }
        }
        MemeStack {
            taxonomy: taxonomy.clone(),
            memes,
        }
    }

    /// Whether the candidate names may all join this stack. False iff any
    /// candidate is the anti-form of a present meme (or vice versa), any
    /// candidate is a `$`-meme already present, or the combined set would
    /// hold two memes from one taxonomy category. Candidates are
    /// deduplicated before checking, so repeats within one call are fine.
    pub fn is_allowed(&self, candidates: &[String]) -> bool {
        let mut targets: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let candidate = normalize(candidate);
            if !candidate.is_empty() && !targets.contains(&candidate) {
                targets.push(candidate);
            }
        }

        for present in &self.memes {
            for target in &targets {
                if violates(present, target) {
                    return false;
                }
            }
        }

        let mut union = self.memes.clone();
        for target in targets {
            if !union.contains(&target) {
                union.push(target);
            }
        }
        self.taxonomy.is_allowed(&union)
    }

    /// Whether the stack's own content is internally consistent.
    pub fn is_valid(&self) -> bool {
        for (i, a) in self.memes.iter().enumerate() {
            for b in &self.memes[i + 1..] {
                if violates(a, b) || violates(b, a) {
                    return false;
                }
            }
        }
        self.taxonomy.is_allowed(&self.memes)
    }

    /// Canonical order-independent identifier for the stack's content:
    /// unique names sorted and joined with `_`.
    pub fn constellation(&self) -> String {
        let mut names = self.memes.clone();
        names.sort();
        names.join("_")
    }

    pub fn memes(&self) -> &[String] {
        &self.memes
    }
}

/// Split a constellation back into its member names.
pub fn constellation_names(constellation: &str) -> Vec<String> {
    constellation
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meme::taxonomy::TaxonomyCategory;

    fn make_taxonomy() -> MemeTaxonomy {
        MemeTaxonomy::from_categories(&[TaxonomyCategory {
            name: "COLOR".into(),
            memes: vec!["RED".into(), "GREEN".into(), "BLUE".into()],
        }])
    }

    fn memes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    // === Taxonomy category exclusivity ===

    #[test]
    fn test_category_member_allowed_on_empty_stack() {
        let stack = MemeStack::from(&make_taxonomy(), &[]);
        assert!(stack.is_allowed(&memes(&["RED"])));
    }

    #[test]
    fn test_second_category_member_rejected() {
        let stack = MemeStack::from(&make_taxonomy(), &memes(&["RED"]));
        assert!(!stack.is_allowed(&memes(&["GREEN"])));
        assert!(stack.is_allowed(&memes(&["RED"])));
    }

    #[test]
    fn test_unrelated_meme_allowed() {
        let stack = MemeStack::from(&make_taxonomy(), &memes(&["RED"]));
        assert!(stack.is_allowed(&memes(&["TROPICAL"])));
    }

    // === Anti-memes ===

    #[test]
    fn test_anti_meme_repels_plain_form() {
        let t = MemeTaxonomy::empty();
        let stack = MemeStack::from(&t, &memes(&["WILD"]));
        assert!(!stack.is_allowed(&memes(&["!WILD"])));

        let stack = MemeStack::from(&t, &memes(&["!WILD"]));
        assert!(!stack.is_allowed(&memes(&["WILD"])));
    }

    #[test]
    fn test_anti_meme_allows_itself() {
        let stack = MemeStack::from(&MemeTaxonomy::empty(), &memes(&["!WILD"]));
        assert!(stack.is_allowed(&memes(&["!WILD"])));
    }

    // === Unique memes ===

    #[test]
    fn test_unique_meme_rejects_second_add() {
        let stack = MemeStack::from(&MemeTaxonomy::empty(), &memes(&["$FLAVOR"]));
        assert!(!stack.is_allowed(&memes(&["$FLAVOR"])));
    }

    #[test]
    fn test_unique_meme_dedup_within_one_call() {
        let stack = MemeStack::from(&MemeTaxonomy::empty(), &[]);
        assert!(stack.is_allowed(&memes(&["$FLAVOR", "$FLAVOR"])));
    }

    // === Normalization ===

    #[test]
    fn test_case_insensitive() {
        let stack = MemeStack::from(&make_taxonomy(), &memes(&["red"]));
        assert_eq!(stack.memes(), &["RED".to_string()]);
        assert!(!stack.is_allowed(&memes(&["Green"])));
    }

    #[test]
    fn test_from_deduplicates() {
        let stack = MemeStack::from(&MemeTaxonomy::empty(), &memes(&["A", "a", "B", "A"]));
        assert_eq!(stack.memes(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_is_valid() {
        let t = make_taxonomy();
        assert!(MemeStack::from(&t, &memes(&["RED", "TROPICAL"])).is_valid());
        assert!(!MemeStack::from(&t, &memes(&["RED", "GREEN"])).is_valid());
        assert!(!MemeStack::from(&t, &memes(&["WILD", "!WILD"])).is_valid());
    }

    // === Constellation ===

    #[test]
    fn test_constellation_is_order_independent() {
        let t = MemeTaxonomy::empty();
        let a = MemeStack::from(&t, &memes(&["WILD", "TROPICAL", "OUTLOOK"]));
        let b = MemeStack::from(&t, &memes(&["outlook", "wild", "TROPICAL"]));
        assert_eq!(a.constellation(), b.constellation());
        assert_eq!(a.constellation(), "OUTLOOK_TROPICAL_WILD");
    }

    #[test]
    fn test_constellation_roundtrip() {
        let stack = MemeStack::from(&MemeTaxonomy::empty(), &memes(&["B", "A"]));
        assert_eq!(
            constellation_names(&stack.constellation()),
            vec!["A".to_string(), "B".to_string()]
        );
    }
}
