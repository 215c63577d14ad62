//! Agents ("mice") and their vitals

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::types::{AgentId, Direction, Position};

/// Health, happiness and energy of one agent
///
/// Each value is kept within `[0, max]` by the rule engine. Health and energy
/// share `max_energy` as their ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: u32,
    pub happiness: u32,
    pub energy: u32,
}

impl Vitals {
    /// Starting vitals for a ruleset's maxima
    pub fn full(max_energy: u32, max_happiness: u32) -> Self {
        Self {
            health: max_energy,
            happiness: max_happiness,
            energy: max_energy,
        }
    }
}

/// Per-agent configuration supplied when a run is created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSpec {
    pub name: String,
    /// Think interval in milliseconds; `None` uses the ruleset's turn duration
    pub movement_delay_ms: Option<u64>,
    /// Explicit start cell; `None` takes the next maze entry point
    pub start: Option<Position>,
    pub tag: Option<String>,
    /// Local strategy id (`random`, `greedy`, ...) used by strategy routing
    pub strategy: Option<String>,
}

impl AgentSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, start: Position) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.movement_delay_ms = Some(delay_ms);
        self
    }
}

/// One agent inside a run. Owned by the run; only the scheduler mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub position: Position,
    /// Where the agent is placed when the run starts
    pub spawn: Position,
    pub vitals: Vitals,
    pub resources_collected: u32,
    pub total_moves: u32,
    /// Committed turns the agent was alive at the end of
    pub turns_survived: u64,
    pub is_alive: bool,
    pub last_direction: Option<Direction>,
    pub think_interval_ms: u64,
    pub tag: Option<String>,
    pub strategy: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, spawn: Position, vitals: Vitals, think_interval_ms: u64) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            position: spawn,
            spawn,
            vitals,
            resources_collected: 0,
            total_moves: 0,
            turns_survived: 0,
            is_alive: true,
            last_direction: None,
            think_interval_ms,
            tag: None,
            strategy: None,
        }
    }

    pub fn from_spec(spec: &AgentSpec, spawn: Position, vitals: Vitals, default_interval_ms: u64) -> Self {
        let mut agent = Self::new(
            spec.name.clone(),
            spawn,
            vitals,
            spec.movement_delay_ms.unwrap_or(default_interval_ms),
        );
        agent.tag = spec.tag.clone();
        agent.strategy = spec.strategy.clone();
        agent
    }

    /// Back to the spawn cell with fresh vitals and zeroed counters
    pub fn reset(&mut self, vitals: Vitals) {
        self.position = self.spawn;
        self.vitals = vitals;
        self.resources_collected = 0;
        self.total_moves = 0;
        self.turns_survived = 0;
        self.is_alive = true;
        self.last_direction = None;
    }

    pub fn think_interval(&self) -> Duration {
        Duration::from_millis(self.think_interval_ms)
    }

    /// Single-character marker for ASCII rendering
    pub fn marker(&self, index: usize) -> char {
        if !self.is_alive {
            return 'x';
        }
        std::char::from_digit((index % 10) as u32, 10).unwrap_or('m')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_vitals() {
        let v = Vitals::full(100, 80);
        assert_eq!(v.health, 100);
        assert_eq!(v.energy, 100);
        assert_eq!(v.happiness, 80);
    }

    #[test]
    fn test_from_spec_uses_default_interval() {
        let spec = AgentSpec::named("Remy").with_strategy("greedy");
        let agent = Agent::from_spec(&spec, Position::new(1, 1), Vitals::full(100, 100), 500);
        assert_eq!(agent.think_interval_ms, 500);
        assert_eq!(agent.strategy.as_deref(), Some("greedy"));
        assert!(agent.is_alive);

        let spec = AgentSpec::named("Speedy").with_delay_ms(200);
        let agent = Agent::from_spec(&spec, Position::new(1, 1), Vitals::full(100, 100), 500);
        assert_eq!(agent.think_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_reset_restores_spawn() {
        let mut agent = Agent::new("Remy", Position::new(1, 1), Vitals::full(100, 100), 500);
        agent.position = Position::new(3, 3);
        agent.resources_collected = 2;
        agent.total_moves = 7;
        agent.is_alive = false;
        agent.vitals.health = 0;

        agent.reset(Vitals::full(100, 100));
        assert_eq!(agent.position, Position::new(1, 1));
        assert_eq!(agent.resources_collected, 0);
        assert_eq!(agent.total_moves, 0);
        assert!(agent.is_alive);
        assert_eq!(agent.vitals.health, 100);
    }

    #[test]
    fn test_marker() {
        let mut agent = Agent::new("Remy", Position::new(1, 1), Vitals::full(100, 100), 500);
        assert_eq!(agent.marker(1), '1');
        agent.is_alive = false;
        assert_eq!(agent.marker(1), 'x');
    }
}
