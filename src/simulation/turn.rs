//! The per-agent turn procedure, split around the decision await
//!
//! [`plan_turn`] reads run state and says whether a decision is needed.
//! [`commit_turn`] applies a decision: move validation, resource pickup,
//! the rule engine. Neither awaits, so both run entirely under the run lock.

use crate::core::error::{MazeError, Result};
use crate::core::types::{AgentId, Direction, Position};
use crate::decision::observation::Observation;
use crate::rules::effects::{apply_turn_effects, TurnContext};
use crate::simulation::run::Run;

/// What an agent needs before its turn can be committed
#[derive(Debug, Clone)]
pub enum TurnPlan {
    /// Dead agents do nothing
    Skip,
    /// Standing on an uncollected resource: collect without moving
    Collect,
    /// Ask the decision gateway
    Decide(Box<Observation>),
}

/// What happened during one committed agent turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    pub agent_id: Option<AgentId>,
    pub moved: bool,
    pub resource_found: bool,
    pub blocked: bool,
    pub died: bool,
    pub events: Vec<String>,
}

pub fn plan_turn(run: &Run, index: usize) -> Result<TurnPlan> {
    let agent = run
        .agents
        .get(index)
        .ok_or_else(|| MazeError::config(format!("no agent at index {}", index)))?;
    if !agent.is_alive {
        return Ok(TurnPlan::Skip);
    }
    if run.grid.has_resource(agent.position) {
        return Ok(TurnPlan::Collect);
    }
    Ok(TurnPlan::Decide(Box::new(Observation::capture(
        run.id,
        run.turn,
        agent,
        &run.agents,
        &run.grid,
    ))))
}

/// Another alive agent within `radius` (Manhattan) of `pos`
fn neighbor_nearby(run: &Run, index: usize, pos: Position, radius: u32) -> bool {
    run.agents
        .iter()
        .enumerate()
        .any(|(i, a)| i != index && a.is_alive && a.position.manhattan(&pos) <= radius)
}

/// Apply one agent's turn. `direction` is `None` when no decision was asked.
pub fn commit_turn(
    run: &mut Run,
    index: usize,
    direction: Option<Direction>,
    proximity_radius: u32,
) -> Result<TurnReport> {
    let agent = run
        .agents
        .get(index)
        .ok_or_else(|| MazeError::config(format!("no agent at index {}", index)))?;
    let mut report = TurnReport {
        agent_id: Some(agent.id),
        ..Default::default()
    };
    if !agent.is_alive {
        return Ok(report);
    }

    let agent_id = agent.id;
    let name = agent.name.clone();
    let from = agent.position;
    let mut position = from;

    if run.grid.consume_resource(from) {
        report.resource_found = true;
        report.events.push(format!("{} picked up cheese at {}", name, from));
    } else if let Some(dir) = direction.filter(|d| d.is_move()) {
        let target = from.step(dir);
        if run.grid.is_passable(target) {
            position = target;
            report.moved = true;
            report
                .events
                .push(format!("{} moved {} to {}", name, dir, target));
            if run.grid.consume_resource(target) {
                report.resource_found = true;
                report.events.push(format!("{} found cheese at {}", name, target));
            }
        } else {
            let err = MazeError::InvalidMove {
                agent: agent_id,
                from,
                to: target,
            };
            tracing::info!(run_id = %run.id, agent = %name, turn = run.turn, "{}", err);
            report.blocked = true;
            report
                .events
                .push(format!("{} bumped into a wall going {}", name, dir));
        }
    }

    let nearby = neighbor_nearby(run, index, position, proximity_radius);
    let agent = &mut run.agents[index];
    agent.position = position;
    if report.moved {
        agent.total_moves += 1;
    }
    if let Some(dir) = direction {
        agent.last_direction = Some(dir);
    }

    let ctx = TurnContext {
        resource_found: report.resource_found,
        neighbor_nearby: nearby,
        moved: report.moved,
    };
    let outcome = apply_turn_effects(agent, &run.ruleset, ctx);
    agent.apply_outcome(outcome);

    if !agent.is_alive {
        report.died = true;
        report.events.push(format!("{} ran out of health", name));
    }

    Ok(report)
}
