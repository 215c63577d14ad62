pub mod agent;

pub use agent::{Agent, AgentSpec, Vitals};
