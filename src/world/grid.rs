//! Grid world: fixed maze geometry plus the shrinking resource set

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::core::error::Result;
use crate::core::types::{Direction, Position};
use crate::world::maze::{GridCell, MazeDefinition};

/// Maze geometry with the collectible resources still on the floor
///
/// Geometry never changes after construction. The resource set starts from
/// the maze's declared positions and only shrinks during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridWorld {
    maze_id: String,
    maze_name: String,
    width: usize,
    height: usize,
    cells: Vec<GridCell>,
    entry_points: Vec<Position>,
    initial_resources: BTreeSet<Position>,
    resources: BTreeSet<Position>,
}

impl GridWorld {
    pub fn from_definition(definition: &MazeDefinition) -> Result<Self> {
        let layout = definition.parse()?;
        let initial_resources: BTreeSet<Position> = layout.resources.into_iter().collect();
        Ok(Self {
            maze_id: definition.id.clone(),
            maze_name: definition.name.clone(),
            width: layout.width,
            height: layout.height,
            cells: layout.cells,
            entry_points: layout.entry_points,
            resources: initial_resources.clone(),
            initial_resources,
        })
    }

    pub fn maze_id(&self) -> &str {
        &self.maze_id
    }

    pub fn maze_name(&self) -> &str {
        &self.maze_name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn entry_points(&self) -> &[Position] {
        &self.entry_points
    }

    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    /// Static cell type at `pos`, `None` outside the maze
    pub fn cell(&self, pos: Position) -> Option<GridCell> {
        if self.in_bounds(pos) {
            Some(self.cells[pos.y as usize * self.width + pos.x as usize])
        } else {
            None
        }
    }

    /// False when out of bounds or a wall
    pub fn is_passable(&self, pos: Position) -> bool {
        matches!(self.cell(pos), Some(cell) if !cell.is_wall())
    }

    pub fn has_resource(&self, pos: Position) -> bool {
        self.resources.contains(&pos)
    }

    /// Remove the resource at `pos`. Returns false if there was none.
    pub fn consume_resource(&mut self, pos: Position) -> bool {
        self.resources.remove(&pos)
    }

    pub fn remaining_resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn initial_resource_count(&self) -> usize {
        self.initial_resources.len()
    }

    pub fn resource_positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.resources.iter().copied()
    }

    /// Put every declared resource back. Only used when a run (re)starts.
    pub(crate) fn restore_resources(&mut self) {
        self.resources = self.initial_resources.clone();
    }

    /// Movement directions whose target cell is passable
    pub fn available_directions(&self, from: Position) -> Vec<Direction> {
        Direction::MOVES
            .iter()
            .copied()
            .filter(|d| self.is_passable(from.step(*d)))
            .collect()
    }

    /// ASCII picture of the current state with optional agent markers
    pub fn render(&self, agents: &[(Position, char)]) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Position::new(x as i32, y as i32);
                let marker = agents.iter().find(|(p, _)| *p == pos).map(|(_, c)| *c);
                let c = match marker {
                    Some(c) => c,
                    None if self.has_resource(pos) => 'C',
                    None => match self.cells[y * self.width + x] {
                        GridCell::Wall => '#',
                        _ => '.',
                    },
                };
                out.push(c);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> GridWorld {
        let maze = MazeDefinition::new(
            "corridor",
            "Corridor",
            &["#####", "#S..#", "#.#C#", "#.C.#", "#####"],
        );
        GridWorld::from_definition(&maze).unwrap()
    }

    #[test]
    fn test_passability() {
        let grid = corridor();
        assert!(grid.is_passable(Position::new(1, 1)));
        assert!(grid.is_passable(Position::new(3, 2)));
        assert!(!grid.is_passable(Position::new(0, 0)));
        assert!(!grid.is_passable(Position::new(2, 2)));
        assert!(!grid.is_passable(Position::new(-1, 1)));
        assert!(!grid.is_passable(Position::new(5, 1)));
        assert!(!grid.is_passable(Position::new(1, 99)));
    }

    #[test]
    fn test_consume_is_idempotent() {
        let mut grid = corridor();
        let pos = Position::new(3, 2);
        assert_eq!(grid.remaining_resource_count(), 2);
        assert!(grid.has_resource(pos));
        assert!(grid.consume_resource(pos));
        assert!(!grid.consume_resource(pos));
        assert!(!grid.has_resource(pos));
        assert_eq!(grid.remaining_resource_count(), 1);
    }

    #[test]
    fn test_consume_empty_cell_returns_false() {
        let mut grid = corridor();
        assert!(!grid.consume_resource(Position::new(1, 1)));
        assert!(!grid.consume_resource(Position::new(-3, -3)));
        assert_eq!(grid.remaining_resource_count(), 2);
    }

    #[test]
    fn test_restore_resources() {
        let mut grid = corridor();
        grid.consume_resource(Position::new(3, 2));
        grid.consume_resource(Position::new(2, 3));
        assert_eq!(grid.remaining_resource_count(), 0);
        grid.restore_resources();
        assert_eq!(grid.remaining_resource_count(), grid.initial_resource_count());
    }

    #[test]
    fn test_available_directions() {
        let grid = corridor();
        let dirs = grid.available_directions(Position::new(1, 1));
        assert_eq!(dirs, vec![Direction::South, Direction::East]);

        let boxed = MazeDefinition::new("box", "Box", &["###", "#S#", "###"]);
        let grid = GridWorld::from_definition(&boxed).unwrap();
        assert!(grid.available_directions(Position::new(1, 1)).is_empty());
    }

    #[test]
    fn test_render_marks_agents_and_resources() {
        let grid = corridor();
        let picture = grid.render(&[(Position::new(1, 1), '1')]);
        let lines: Vec<&str> = picture.lines().collect();
        assert_eq!(lines[1], "#1..#");
        assert_eq!(lines[2], "#.#C#");
    }
}
