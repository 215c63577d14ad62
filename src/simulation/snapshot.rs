//! Per-turn snapshots

use serde::{Deserialize, Serialize};

use crate::core::types::{AgentId, Position, Turn};
use crate::entity::agent::{Agent, Vitals};
use crate::world::grid::GridWorld;

/// One agent at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFrame {
    pub agent_id: AgentId,
    pub name: String,
    pub position: Position,
    pub vitals: Vitals,
    pub resources_collected: u32,
    pub is_alive: bool,
}

impl From<&Agent> for AgentFrame {
    fn from(agent: &Agent) -> Self {
        Self {
            agent_id: agent.id,
            name: agent.name.clone(),
            position: agent.position,
            vitals: agent.vitals,
            resources_collected: agent.resources_collected,
            is_alive: agent.is_alive,
        }
    }
}

/// State of every agent and the remaining resources after a committed turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    pub turn: Turn,
    pub agents: Vec<AgentFrame>,
    pub resources: Vec<Position>,
    /// Human-readable log of what happened this turn
    pub events: Vec<String>,
}

impl TurnSnapshot {
    pub fn capture(turn: Turn, agents: &[Agent], grid: &GridWorld, events: Vec<String>) -> Self {
        Self {
            turn,
            agents: agents.iter().map(AgentFrame::from).collect(),
            resources: grid.resource_positions().collect(),
            events,
        }
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentFrame> {
        self.agents.iter().find(|a| a.agent_id == id)
    }
}
