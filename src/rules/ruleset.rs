//! Ruleset definitions and win-condition checks

use serde::{Deserialize, Serialize};

use crate::core::error::{MazeError, Result};
use crate::entity::agent::Agent;

/// How health is drained over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RulesetMode {
    /// No attrition, agents never die
    #[default]
    Normal,
    /// -1 health every 5 moves, agents never die
    #[serde(alias = "survival", alias = "survie")]
    AttritionSoft,
    /// -10 health every 5 moves, death at 0 health
    #[serde(alias = "lethal", alias = "mortelle")]
    AttritionLethal,
}

impl RulesetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RulesetMode::Normal => "normal",
            RulesetMode::AttritionSoft => "attrition-soft",
            RulesetMode::AttritionLethal => "attrition-lethal",
        }
    }

    pub fn is_lethal(&self) -> bool {
        matches!(self, RulesetMode::AttritionLethal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinConditionKind {
    #[serde(alias = "cheese_count")]
    ResourceCount,
    Energy,
    Happiness,
    #[serde(alias = "survival")]
    SurvivalTurns,
}

/// One way for an agent to win. Thresholds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinCondition {
    #[serde(rename = "type")]
    pub kind: WinConditionKind,
    #[serde(alias = "value")]
    pub threshold: u64,
    #[serde(default)]
    pub description: String,
}

impl WinCondition {
    pub fn new(kind: WinConditionKind, threshold: u64) -> Self {
        Self {
            kind,
            threshold,
            description: String::new(),
        }
    }

    pub fn is_met(&self, agent: &Agent) -> bool {
        let value = match self.kind {
            WinConditionKind::ResourceCount => agent.resources_collected as u64,
            WinConditionKind::Energy => agent.vitals.energy as u64,
            WinConditionKind::Happiness => agent.vitals.happiness as u64,
            WinConditionKind::SurvivalTurns => agent.turns_survived,
        };
        value >= self.threshold
    }
}

/// Named rule configuration. Immutable once a run has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ruleset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub description: String,
    #[serde(alias = "turn_duration")]
    pub turn_duration_ms: u64,
    pub energy_consumption: u32,
    pub happiness_decay: u32,
    pub isolation_penalty: u32,
    #[serde(alias = "cheese_bonus")]
    pub resource_bonus: u32,
    pub proximity_bonus: u32,
    pub max_energy: u32,
    pub max_happiness: u32,
    pub win_conditions: Vec<WinCondition>,
    pub mode: RulesetMode,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            id: "classic".into(),
            name: "Classic".into(),
            description: String::new(),
            turn_duration_ms: 500,
            energy_consumption: 1,
            happiness_decay: 1,
            isolation_penalty: 1,
            resource_bonus: 20,
            proximity_bonus: 5,
            max_energy: 100,
            max_happiness: 100,
            win_conditions: Vec::new(),
            mode: RulesetMode::Normal,
        }
    }
}

impl Ruleset {
    /// Energy and happiness never decay below this
    pub const VITAL_FLOOR: u32 = 10;

    pub fn with_mode(mut self, mode: RulesetMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_win_condition(mut self, condition: WinCondition) -> Self {
        self.win_conditions.push(condition);
        self
    }

    /// An agent wins only after collecting at least one resource and
    /// meeting any one of the conditions. No conditions means no winner.
    pub fn agent_wins(&self, agent: &Agent) -> bool {
        agent.is_alive
            && agent.resources_collected >= 1
            && self.win_conditions.iter().any(|c| c.is_met(agent))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MazeError::config("ruleset name must not be empty"));
        }
        if self.turn_duration_ms == 0 {
            return Err(MazeError::config(format!(
                "ruleset '{}': turn_duration_ms must be positive",
                self.name
            )));
        }
        if self.max_energy < Self::VITAL_FLOOR || self.max_happiness < Self::VITAL_FLOOR {
            return Err(MazeError::config(format!(
                "ruleset '{}': max_energy and max_happiness must be at least {}",
                self.name,
                Self::VITAL_FLOOR
            )));
        }
        Ok(())
    }
}
