//! Load rulesets from TOML files

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::core::error::{MazeError, Result};
use crate::rules::ruleset::Ruleset;

const PREDEFINED: &str = include_str!("../../data/rulesets.toml");

#[derive(Debug, Deserialize)]
struct RulesetFile {
    #[serde(default)]
    ruleset: Vec<Ruleset>,
}

/// A set of rulesets addressable by id or name
#[derive(Debug, Clone, Default)]
pub struct RulesetCatalog {
    rulesets: Vec<Ruleset>,
}

impl RulesetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rulesets shipped with the crate
    pub fn predefined() -> Result<Self> {
        parse_rulesets_toml(PREDEFINED)
    }

    /// Look up by id, then by case-insensitive name
    pub fn get(&self, key: &str) -> Option<&Ruleset> {
        self.rulesets
            .iter()
            .find(|r| r.id == key)
            .or_else(|| self.rulesets.iter().find(|r| r.name.eq_ignore_ascii_case(key)))
    }

    /// Insert or replace by id
    pub fn insert(&mut self, ruleset: Ruleset) {
        match self.rulesets.iter_mut().find(|r| r.id == ruleset.id) {
            Some(existing) => *existing = ruleset,
            None => self.rulesets.push(ruleset),
        }
    }

    /// Overlay another catalog; entries with the same id are replaced
    pub fn merge(&mut self, other: RulesetCatalog) {
        for ruleset in other.rulesets {
            self.insert(ruleset);
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rulesets.iter().map(|r| r.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.rulesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }

    pub fn require(&self, key: &str) -> Result<Ruleset> {
        self.get(key).cloned().ok_or_else(|| {
            MazeError::config(format!(
                "unknown ruleset '{}' (available: {})",
                key,
                self.ids().collect::<Vec<_>>().join(", ")
            ))
        })
    }
}

/// Parse a `[[ruleset]]` document, validating every entry
pub fn parse_rulesets_toml(content: &str) -> Result<RulesetCatalog> {
    let file: RulesetFile = toml::from_str(content)?;
    let mut catalog = RulesetCatalog::new();
    for mut ruleset in file.ruleset {
        if ruleset.id.is_empty() {
            ruleset.id = ruleset.name.to_ascii_lowercase().replace(' ', "-");
        }
        ruleset.validate()?;
        catalog.insert(ruleset);
    }
    Ok(catalog)
}

/// Load a ruleset file from disk
pub fn load_rulesets(path: &Path) -> Result<RulesetCatalog> {
    let content = fs::read_to_string(path).map_err(|e| {
        MazeError::config(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_rulesets_toml(&content)
}
