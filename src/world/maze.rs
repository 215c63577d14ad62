//! Maze definitions: ASCII rows parsed into typed cells
//!
//! Row characters:
//! - `#` wall
//! - `.` or space: open floor
//! - `C` / `R`: open floor holding a resource ("cheese")
//! - `S` / `E`: open floor marked as an entry point

use serde::{Deserialize, Serialize};

use crate::core::error::{MazeError, Result};
use crate::core::types::Position;

/// One cell of the maze geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridCell {
    Wall,
    #[default]
    Open,
    Resource,
    Entry,
}

impl GridCell {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '#' => Some(GridCell::Wall),
            '.' | ' ' => Some(GridCell::Open),
            'C' | 'R' => Some(GridCell::Resource),
            'S' | 'E' => Some(GridCell::Entry),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            GridCell::Wall => '#',
            GridCell::Open => '.',
            GridCell::Resource => 'C',
            GridCell::Entry => 'S',
        }
    }

    #[inline]
    pub fn is_wall(self) -> bool {
        matches!(self, GridCell::Wall)
    }
}

/// A maze as authored: identity plus ASCII rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rows: Vec<String>,
}

/// Parsed, validated geometry
#[derive(Debug, Clone)]
pub struct MazeLayout {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<GridCell>,
    pub entry_points: Vec<Position>,
    pub resources: Vec<Position>,
}

impl MazeDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rows: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            rows: rows.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Parse the rows into a layout, failing fast on anything that would make
    /// a run impossible to set up.
    pub fn parse(&self) -> Result<MazeLayout> {
        let height = self.rows.len();
        if height == 0 {
            return Err(MazeError::config(format!("maze '{}' has no rows", self.id)));
        }

        let width = self.rows[0].chars().count();
        if width == 0 {
            return Err(MazeError::config(format!("maze '{}' has an empty first row", self.id)));
        }

        let mut cells = Vec::with_capacity(width * height);
        let mut entry_points = Vec::new();
        let mut resources = Vec::new();

        for (y, row) in self.rows.iter().enumerate() {
            let row_width = row.chars().count();
            if row_width != width {
                return Err(MazeError::config(format!(
                    "maze '{}': row {} has width {}, expected {}",
                    self.id, y, row_width, width
                )));
            }
            for (x, c) in row.chars().enumerate() {
                let cell = GridCell::from_char(c).ok_or_else(|| {
                    MazeError::config(format!(
                        "maze '{}': unknown cell '{}' at ({}, {})",
                        self.id, c, x, y
                    ))
                })?;
                let pos = Position::new(x as i32, y as i32);
                match cell {
                    GridCell::Entry => entry_points.push(pos),
                    GridCell::Resource => resources.push(pos),
                    _ => {}
                }
                cells.push(cell);
            }
        }

        if entry_points.is_empty() {
            return Err(MazeError::config(format!(
                "maze '{}' declares no entry points",
                self.id
            )));
        }

        Ok(MazeLayout {
            width,
            height,
            cells,
            entry_points,
            resources,
        })
    }
}
