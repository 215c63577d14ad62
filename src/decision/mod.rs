//! Per-turn decisions: what an agent sees and who chooses its move

pub mod client;
pub mod gateway;
pub mod observation;
pub mod parser;
pub mod provider;
pub mod strategies;

pub use client::HttpDecisionProvider;
pub use gateway::{Decision, DecisionGateway, DecisionSource};
pub use observation::{DecisionRequest, NeighborView, Observation};
pub use parser::{extract_json, parse_decision};
pub use provider::{DecisionError, DecisionProvider, StrategyRouter};
pub use strategies::{LocalStrategyProvider, StrategyKind};
