//! Maze geometry and the collectible resources on it

pub mod grid;
pub mod loader;
pub mod maze;

pub use grid::GridWorld;
pub use loader::{builtin_maze, load_maze, resolve_maze, BUILTIN_MAZES};
pub use maze::{GridCell, MazeDefinition};
