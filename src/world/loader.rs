//! Load maze definitions from TOML or JSON files, or from the bundled set

use std::path::Path;

use crate::core::error::{MazeError, Result};
use crate::world::maze::MazeDefinition;

const SIMPLE: &str = include_str!("../../data/mazes/simple.toml");
const COMPLEX: &str = include_str!("../../data/mazes/complex.toml");
const SOCIAL: &str = include_str!("../../data/mazes/social.toml");

/// Names of the mazes shipped with the crate
pub const BUILTIN_MAZES: [&str; 3] = ["simple", "complex", "social"];

/// Parse a maze from TOML text and validate its geometry
pub fn parse_maze_toml(content: &str) -> Result<MazeDefinition> {
    let maze: MazeDefinition = toml::from_str(content)?;
    maze.parse()?;
    Ok(maze)
}

/// Load a maze file; `.json` is read as JSON, anything else as TOML
pub fn load_maze(path: &Path) -> Result<MazeDefinition> {
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let maze: MazeDefinition = serde_json::from_str(&content)?;
        maze.parse()?;
        Ok(maze)
    } else {
        parse_maze_toml(&content)
    }
}

/// Look up one of the bundled mazes by id
pub fn builtin_maze(name: &str) -> Result<MazeDefinition> {
    let content = match name {
        "simple" => SIMPLE,
        "complex" => COMPLEX,
        "social" => SOCIAL,
        other => {
            return Err(MazeError::config(format!(
                "unknown built-in maze '{}' (available: {})",
                other,
                BUILTIN_MAZES.join(", ")
            )))
        }
    };
    parse_maze_toml(content)
}

/// Resolve a CLI argument: a bundled maze name, or a path on disk
pub fn resolve_maze(spec: &str) -> Result<MazeDefinition> {
    if BUILTIN_MAZES.contains(&spec) {
        builtin_maze(spec)
    } else {
        load_maze(Path::new(spec))
    }
}
