//! Flat exports of a run: per-turn rows, a summary, CSV

use serde::Serialize;
use std::io::Write;

use crate::core::error::Result;
use crate::core::types::{AgentId, RunId, Turn};
use crate::simulation::run::{Run, RunStatus, TerminationReason};
use crate::simulation::snapshot::TurnSnapshot;

pub const CSV_HEADER: &str = "turn,agentId,x,y,health,happiness,resourcesCollected";

/// One agent at one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub turn: Turn,
    pub agent_id: AgentId,
    pub x: i32,
    pub y: i32,
    pub health: u32,
    pub happiness: u32,
    pub resources_collected: u32,
}

impl ExportRow {
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.turn, self.agent_id, self.x, self.y, self.health, self.happiness, self.resources_collected
        )
    }
}

/// Lazily flatten snapshots into rows, one per (turn, agent)
pub fn export_rows(history: &[TurnSnapshot]) -> impl Iterator<Item = ExportRow> + '_ {
    history.iter().flat_map(|snapshot| {
        snapshot.agents.iter().map(move |a| ExportRow {
            turn: snapshot.turn,
            agent_id: a.agent_id,
            x: a.position.x,
            y: a.position.y,
            health: a.vitals.health,
            happiness: a.vitals.happiness,
            resources_collected: a.resources_collected,
        })
    })
}

/// Write rows as CSV with a header line. Returns the number of rows.
pub fn write_csv<W: Write>(rows: impl Iterator<Item = ExportRow>, mut out: W) -> Result<usize> {
    writeln!(out, "{}", CSV_HEADER)?;
    let mut count = 0;
    for row in rows {
        writeln!(out, "{}", row.to_csv_line())?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub name: String,
    pub resources_collected: u32,
    pub final_health: u32,
    pub final_happiness: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: RunId,
    pub ruleset: String,
    pub status: RunStatus,
    pub reason: Option<TerminationReason>,
    pub total_turns: Turn,
    pub resources_remaining: usize,
    pub per_agent: Vec<AgentSummary>,
}

impl RunSummary {
    pub fn from_run(run: &Run) -> Self {
        Self {
            run_id: run.id,
            ruleset: run.ruleset.name.clone(),
            status: run.status,
            reason: run.termination.clone(),
            total_turns: run.turn,
            resources_remaining: run.grid.remaining_resource_count(),
            per_agent: run
                .agents
                .iter()
                .map(|a| AgentSummary {
                    name: a.name.clone(),
                    resources_collected: a.resources_collected,
                    final_health: a.vitals.health,
                    final_happiness: a.vitals.happiness,
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Run {} [{}] - ruleset {}, {} turns, {} resources left",
            self.run_id, self.status, self.ruleset, self.total_turns, self.resources_remaining
        )];
        if let Some(reason) = &self.reason {
            lines.push(format!("Ended: {}", reason));
        }
        for a in &self.per_agent {
            lines.push(format!(
                "  {:<12} cheese {:>2}  health {:>3}  happiness {:>3}",
                a.name, a.resources_collected, a.final_health, a.final_happiness
            ));
        }
        lines.join("\n")
    }
}

impl Run {
    pub fn export_rows(&self) -> impl Iterator<Item = ExportRow> + '_ {
        export_rows(&self.history)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_run(self)
    }
}
