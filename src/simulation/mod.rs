//! Simulation runs: state, the turn procedure and the scheduler that drives it

pub mod events;
pub mod export;
pub mod manager;
pub mod run;
pub mod scheduler;
pub mod snapshot;
pub mod termination;
pub mod turn;

pub use events::{EventPublisher, RunEvent};
pub use export::{export_rows, write_csv, ExportRow, RunSummary, CSV_HEADER};
pub use manager::{RunManager, ShareLink};
pub use run::{AgentResult, Run, RunConfig, RunResults, RunStatus, TerminationReason};
pub use scheduler::{Scheduler, StepOutcome};
pub use snapshot::{AgentFrame, TurnSnapshot};
pub use termination::check_termination;
pub use turn::{commit_turn, plan_turn, TurnPlan, TurnReport};
