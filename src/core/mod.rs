pub mod config;
pub mod error;
pub mod types;

pub use config::{Discipline, EngineConfig};
pub use error::{MazeError, Result};
pub use types::{AgentId, Direction, Position, RunId, Turn};
