//! Per-turn vitals update
//!
//! `apply_turn_effects` is a pure function of the agent, the ruleset and the
//! turn context. The scheduler assigns its output back onto the agent.

use crate::entity::agent::{Agent, Vitals};
use crate::rules::ruleset::{Ruleset, RulesetMode};

/// Attrition applies on every Nth move
pub const ATTRITION_PERIOD: u32 = 5;
/// Health lost per attrition step in soft mode. Soft attrition stops at 1
/// health rather than 0, so only lethal mode can kill an agent.
pub const SOFT_ATTRITION: u32 = 1;
pub const LETHAL_ATTRITION: u32 = 10;
/// Energy and health restored by one resource
pub const RESOURCE_RESTORE: u32 = 10;

/// What happened to the agent during this turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnContext {
    pub resource_found: bool,
    pub neighbor_nearby: bool,
    /// The agent changed cell this turn
    pub moved: bool,
}

/// Result of the rule engine for one agent turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub vitals: Vitals,
    pub resources_collected: u32,
    pub is_alive: bool,
}

pub fn apply_turn_effects(agent: &Agent, rules: &Ruleset, ctx: TurnContext) -> TurnOutcome {
    let floor = Ruleset::VITAL_FLOOR;
    let Vitals {
        mut health,
        mut happiness,
        mut energy,
    } = agent.vitals;
    let mut resources_collected = agent.resources_collected;

    let attrition_due =
        ctx.moved && agent.total_moves > 0 && agent.total_moves % ATTRITION_PERIOD == 0;
    if attrition_due {
        match rules.mode {
            // soft attrition wears an agent down but never to zero
            RulesetMode::AttritionSoft => {
                health = health.saturating_sub(SOFT_ATTRITION).max(health.min(1))
            }
            RulesetMode::AttritionLethal => health = health.saturating_sub(LETHAL_ATTRITION),
            RulesetMode::Normal => {}
        }
    }

    energy = energy.saturating_sub(rules.energy_consumption).max(floor);
    happiness = happiness.saturating_sub(rules.happiness_decay).max(floor);

    if ctx.neighbor_nearby {
        happiness = (happiness + rules.proximity_bonus).min(rules.max_happiness);
    } else {
        happiness = happiness.saturating_sub(rules.isolation_penalty).max(floor);
    }

    if ctx.resource_found {
        resources_collected += 1;
        happiness = (happiness + rules.resource_bonus).min(rules.max_happiness);
        energy = (energy + RESOURCE_RESTORE).min(rules.max_energy);
        health = (health + RESOURCE_RESTORE).min(rules.max_energy);
    }

    let is_alive = match rules.mode {
        RulesetMode::AttritionLethal => health > 0,
        _ => true,
    };

    TurnOutcome {
        vitals: Vitals {
            health,
            happiness,
            energy,
        },
        resources_collected,
        is_alive,
    }
}

impl Agent {
    /// Assign a rule-engine outcome onto this agent
    pub fn apply_outcome(&mut self, outcome: TurnOutcome) {
        self.vitals = outcome.vitals;
        self.resources_collected = outcome.resources_collected;
        self.is_alive = outcome.is_alive;
        if self.is_alive {
            self.turns_survived += 1;
        }
    }
}
