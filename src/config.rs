use std::path::Path;

use serde::Deserialize;

use crate::meme::taxonomy::{MemeTaxonomy, TaxonomyCategory};

/// Engine configuration loaded from a TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Named categories whose member memes are mutually exclusive on one
    /// segment, e.g. a SEASON category holding SUMMER and WINTER.
    pub taxonomy: Vec<TaxonomyCategory>,
    /// Craft scoring and seeding.
    pub craft: CraftSettings,
}

/// Craft scoring and seeding knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CraftSettings {
    /// Base seed for all segment randomness. The same seed over the same
    /// catalog reproduces the same chain of decisions.
    pub seed: u64,
    /// Score per matched meme when choosing macro and main programs.
    pub matched_memes_weight: f64,
    /// Score per matched meme when choosing rhythm and detail programs
    /// and instruments.
    pub rhythm_matched_memes_weight: f64,
    /// Score adjustment for re-picking the immediately previous program.
    /// Negative, so fresh content wins unless nothing else is eligible.
    pub avoid_previous_penalty: f64,
}

impl Default for CraftSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            matched_memes_weight: 10.0,
            rhythm_matched_memes_weight: 5.0,
            avoid_previous_penalty: -5.0,
        }
    }
}

impl EngineConfig {
    /// Load config from the given TOML file.
    /// Returns default config when no path is given.
    /// Logs a warning if the file exists but can't be read or parsed.
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(contents) => match toml::from_str::<EngineConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to parse {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            None => {
                log::debug!("No config file given, using defaults");
                Self::default()
            }
        }
    }

    /// The taxonomy as the meme layer consumes it.
    pub fn taxonomy(&self) -> MemeTaxonomy {
        MemeTaxonomy::from_categories(&self.taxonomy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.craft.seed, 0);
        assert!((config.craft.matched_memes_weight - 10.0).abs() < f64::EPSILON);
        assert!((config.craft.rhythm_matched_memes_weight - 5.0).abs() < f64::EPSILON);
        assert!((config.craft.avoid_previous_penalty - -5.0).abs() < f64::EPSILON);
        assert!(config.taxonomy.is_empty());
        assert!(config.taxonomy().is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [[taxonomy]]
            name = "SEASON"
            memes = ["SUMMER", "WINTER"]

            [[taxonomy]]
            name = "COLOR"
            memes = ["RED", "GREEN"]

            [craft]
            seed = 42
            matched_memes_weight = 20.0
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.taxonomy.len(), 2);
        assert_eq!(config.craft.seed, 42);
        assert!((config.craft.matched_memes_weight - 20.0).abs() < f64::EPSILON);
        // Unspecified craft fields keep their defaults
        assert!((config.craft.avoid_previous_penalty - -5.0).abs() < f64::EPSILON);

        let taxonomy = config.taxonomy();
        assert_eq!(taxonomy.category_of("summer"), Some("SEASON"));
        assert_eq!(taxonomy.category_of("RED"), Some("COLOR"));
        assert_eq!(taxonomy.category_of("TROPICAL"), None);
    }

    #[test]
    fn test_missing_path_uses_defaults() {
        let config = EngineConfig::load(None);
        assert_eq!(config.craft.seed, 0);
    }
}
