//! Rulesets and the per-turn rule engine

pub mod effects;
pub mod loader;
pub mod ruleset;

pub use effects::{apply_turn_effects, TurnContext, TurnOutcome};
pub use loader::{load_rulesets, parse_rulesets_toml, RulesetCatalog};
pub use ruleset::{Ruleset, RulesetMode, WinCondition, WinConditionKind};
