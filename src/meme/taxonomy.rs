use serde::Deserialize;

use crate::meme::normalize;

/// One mutually-exclusive meme category as authored in config, e.g.
/// `{ name = "COLOR", memes = ["RED", "GREEN", "BLUE"] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyCategory {
    pub name: String,
    pub memes: Vec<String>,
}

#[derive(Debug, Clone)]
struct Category {
    name: String,
    memes: Vec<String>,
}

/// A set of named categories whose member memes are mutually exclusive:
/// a meme set may carry at most one meme from each category.
#[derive(Debug, Clone, Default)]
pub struct MemeTaxonomy {
    categories: Vec<Category>,
}

impl MemeTaxonomy {
    pub fn empty() -> MemeTaxonomy {
        MemeTaxonomy::default()
    }

    /// Build from config categories, normalizing all names.
    pub fn from_categories(categories: &[TaxonomyCategory]) -> MemeTaxonomy {
        MemeTaxonomy {
            categories: categories
                .iter()
                .map(|c| Category {
                    name: normalize(&c.name),
                    memes: c.memes.iter().map(|m| normalize(m)).collect(),
                })
                .collect(),
        }
    }

    /// The category a (normalized) meme name belongs to, if any. Prefixed
    /// forms (`!NAME`, `$NAME`) belong to no category.
    pub fn category_of(&self, meme: &str) -> Option<&str> {
        let meme = normalize(meme);
        self.categories
            .iter()
            .find(|c| c.memes.contains(&meme))
            .map(|c| c.name.as_str())
    }

    /// True when no category is represented more than once in the set.
    pub fn is_allowed(&self, memes: &[String]) -> bool {
        for category in &self.categories {
            let count = memes
                .iter()
                .filter(|m| category.memes.contains(&normalize(m)))
                .count();
            if count > 1 {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_taxonomy() -> MemeTaxonomy {
        MemeTaxonomy::from_categories(&[
            TaxonomyCategory {
                name: "COLOR".into(),
                memes: vec!["RED".into(), "GREEN".into(), "BLUE".into()],
            },
            TaxonomyCategory {
                name: "SEASON".into(),
                memes: vec!["WINTER".into(), "SPRING".into(), "SUMMER".into(), "FALL".into()],
            },
        ])
    }

    fn memes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_category_of() {
        let t = make_taxonomy();
        assert_eq!(t.category_of("RED"), Some("COLOR"));
        assert_eq!(t.category_of("summer"), Some("SEASON"));
        assert_eq!(t.category_of("TROPICAL"), None);
    }

    #[test]
    fn test_allows_one_per_category() {
        let t = make_taxonomy();
        assert!(t.is_allowed(&memes(&["RED", "WINTER"])));
        assert!(t.is_allowed(&memes(&["RED", "TROPICAL"])));
        assert!(!t.is_allowed(&memes(&["RED", "GREEN"])));
        assert!(!t.is_allowed(&memes(&["RED", "WINTER", "FALL"])));
    }

    #[test]
    fn test_case_insensitive_membership() {
        let t = make_taxonomy();
        assert!(!t.is_allowed(&memes(&["red", "Green"])));
    }

    #[test]
    fn test_empty_taxonomy_allows_everything() {
        let t = MemeTaxonomy::empty();
        assert!(t.is_allowed(&memes(&["RED", "GREEN", "ANYTHING"])));
    }
}
