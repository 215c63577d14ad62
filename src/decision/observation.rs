//! What an agent can see when it is asked for a move
//!
//! The observation is captured from run state under the run lock and then
//! handed to the decision gateway by value, so providers never touch the run.

use serde::{Deserialize, Serialize};

use crate::core::types::{AgentId, Direction, Position, RunId, Turn};
use crate::entity::agent::{Agent, Vitals};
use crate::world::grid::GridWorld;

/// Another alive agent as seen by the observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborView {
    pub id: AgentId,
    pub name: String,
    pub position: Position,
    pub distance: u32,
}

/// Local view of the world for one agent at one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub run_id: RunId,
    pub turn: Turn,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub position: Position,
    pub vitals: Vitals,
    pub resources_collected: u32,
    pub last_direction: Option<Direction>,
    pub strategy: Option<String>,
    /// Directions whose target cell is passable
    pub available_directions: Vec<Direction>,
    /// Uncollected resource positions
    pub resources: Vec<Position>,
    pub others: Vec<NeighborView>,
    pub grid_width: usize,
    pub grid_height: usize,
}

impl Observation {
    pub fn capture(run_id: RunId, turn: Turn, agent: &Agent, agents: &[Agent], grid: &GridWorld) -> Self {
        let others = agents
            .iter()
            .filter(|a| a.id != agent.id && a.is_alive)
            .map(|a| NeighborView {
                id: a.id,
                name: a.name.clone(),
                position: a.position,
                distance: agent.position.manhattan(&a.position),
            })
            .collect();

        Self {
            run_id,
            turn,
            agent_id: agent.id,
            agent_name: agent.name.clone(),
            position: agent.position,
            vitals: agent.vitals,
            resources_collected: agent.resources_collected,
            last_direction: agent.last_direction,
            strategy: agent.strategy.clone(),
            available_directions: grid.available_directions(agent.position),
            resources: grid.resource_positions().collect(),
            others,
            grid_width: grid.width(),
            grid_height: grid.height(),
        }
    }

    pub fn can_move(&self, direction: Direction) -> bool {
        self.available_directions.contains(&direction)
    }

    /// Closest resource by Manhattan distance; ties go to the first in order
    pub fn nearest_resource(&self) -> Option<Position> {
        self.resources
            .iter()
            .copied()
            .min_by_key(|r| self.position.manhattan(r))
    }

    /// One-paragraph text description, sent along with the request
    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} at {} on turn {}: health {}, happiness {}, energy {}, {} collected.",
            self.agent_name,
            self.position,
            self.turn,
            self.vitals.health,
            self.vitals.happiness,
            self.vitals.energy,
            self.resources_collected,
        );
        if self.available_directions.is_empty() {
            s.push_str(" Boxed in.");
        } else {
            let moves: Vec<&str> = self.available_directions.iter().map(|d| d.as_str()).collect();
            s.push_str(&format!(" Can move {}.", moves.join(", ")));
        }
        match self.nearest_resource() {
            Some(r) => s.push_str(&format!(
                " {} resources left, nearest at {} ({} away).",
                self.resources.len(),
                r,
                self.position.manhattan(&r)
            )),
            None => s.push_str(" No resources left."),
        }
        if !self.others.is_empty() {
            s.push_str(&format!(" {} other agents visible.", self.others.len()));
        }
        s
    }

    pub fn to_request(&self) -> DecisionRequest {
        DecisionRequest {
            agent_id: self.agent_id,
            turn: self.turn,
            position: self.position,
            vitals: self.vitals,
            resources_collected: self.resources_collected,
            available_moves: self.available_directions.iter().map(|d| d.as_str()).collect(),
            resources: self.resources.clone(),
            other_agents: self
                .others
                .iter()
                .map(|o| OtherAgent {
                    id: o.id,
                    position: o.position,
                    distance: o.distance,
                })
                .collect(),
            strategy: self.strategy.clone(),
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            summary: self.summary(),
        }
    }
}

/// JSON body posted to an external decision service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub agent_id: AgentId,
    pub turn: Turn,
    pub position: Position,
    pub vitals: Vitals,
    pub resources_collected: u32,
    pub available_moves: Vec<&'static str>,
    pub resources: Vec<Position>,
    pub other_agents: Vec<OtherAgent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub grid_width: usize,
    pub grid_height: usize,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OtherAgent {
    pub id: AgentId,
    pub position: Position,
    pub distance: u32,
}
