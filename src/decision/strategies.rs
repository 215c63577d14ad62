//! In-process decision strategies
//!
//! Let a run work with no external service. Every random choice is drawn
//! from a ChaCha8 stream seeded from the provider seed and the observation,
//! so the same observation always yields the same move.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::error::MazeError;
use crate::core::types::Direction;
use crate::decision::observation::Observation;
use crate::decision::provider::{DecisionError, DecisionProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Uniform over the open directions
    Random,
    /// Towards the nearest resource, larger axis first
    Greedy,
    /// Keep heading until blocked, then turn at random
    Straight,
    /// Preferred axis towards the nearest resource, else random
    Directional,
    /// Towards the centroid of the other agents, else greedy
    Social,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Random,
        StrategyKind::Greedy,
        StrategyKind::Straight,
        StrategyKind::Directional,
        StrategyKind::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::Greedy => "greedy",
            StrategyKind::Straight => "straight",
            StrategyKind::Directional => "directional",
            StrategyKind::Social => "social",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = MazeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(StrategyKind::Random),
            "greedy" | "smart" => Ok(StrategyKind::Greedy),
            "straight" => Ok(StrategyKind::Straight),
            "directional" => Ok(StrategyKind::Directional),
            "social" => Ok(StrategyKind::Social),
            other => Err(MazeError::config(format!("unknown strategy '{}'", other))),
        }
    }
}

/// Mix a base seed with the parts of an observation that identify a decision
pub(crate) fn observation_seed(seed: u64, obs: &Observation) -> u64 {
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut h = seed ^ 0xcbf2_9ce4_8422_2325;
    for word in [obs.turn, obs.position.x as u64, obs.position.y as u64] {
        h = (h ^ word).wrapping_mul(PRIME).rotate_left(17);
    }
    for b in obs.agent_name.bytes() {
        h = (h ^ b as u64).wrapping_mul(PRIME);
    }
    h
}

/// Uniform choice among `available`; `Stay` when boxed in
pub fn random_move(available: &[Direction], rng: &mut ChaCha8Rng) -> Direction {
    available.choose(rng).copied().unwrap_or(Direction::Stay)
}

fn horizontal(dx: i32) -> Option<Direction> {
    match dx.signum() {
        1 => Some(Direction::East),
        -1 => Some(Direction::West),
        _ => None,
    }
}

fn vertical(dy: i32) -> Option<Direction> {
    match dy.signum() {
        1 => Some(Direction::South),
        -1 => Some(Direction::North),
        _ => None,
    }
}

/// Single preferred direction along the dominant axis of `(dx, dy)`
fn preferred_towards(dx: f64, dy: f64) -> Direction {
    if dx.abs() > dy.abs() {
        if dx > 0.0 {
            Direction::East
        } else {
            Direction::West
        }
    } else if dy > 0.0 {
        Direction::South
    } else {
        Direction::North
    }
}

/// First open direction that closes distance to the nearest resource
pub fn greedy_move(obs: &Observation) -> Option<Direction> {
    let target = obs.nearest_resource()?;
    let dx = target.x - obs.position.x;
    let dy = target.y - obs.position.y;
    let candidates = if dx.abs() >= dy.abs() {
        [horizontal(dx), vertical(dy)]
    } else {
        [vertical(dy), horizontal(dx)]
    };
    candidates.into_iter().flatten().find(|d| obs.can_move(*d))
}

fn directional_move(obs: &Observation, rng: &mut ChaCha8Rng) -> Direction {
    if let Some(target) = obs.nearest_resource() {
        let dx = (target.x - obs.position.x) as f64;
        let dy = (target.y - obs.position.y) as f64;
        let preferred = preferred_towards(dx, dy);
        if obs.can_move(preferred) {
            return preferred;
        }
    }
    random_move(&obs.available_directions, rng)
}

fn straight_move(obs: &Observation, rng: &mut ChaCha8Rng) -> Direction {
    match obs.last_direction {
        Some(d) if d.is_move() && obs.can_move(d) => d,
        _ => random_move(&obs.available_directions, rng),
    }
}

fn social_move(obs: &Observation, rng: &mut ChaCha8Rng) -> Direction {
    if !obs.others.is_empty() {
        let n = obs.others.len() as f64;
        let cx = obs.others.iter().map(|o| o.position.x as f64).sum::<f64>() / n;
        let cy = obs.others.iter().map(|o| o.position.y as f64).sum::<f64>() / n;
        let toward = preferred_towards(cx - obs.position.x as f64, cy - obs.position.y as f64);
        if obs.can_move(toward) {
            return toward;
        }
    }
    greedy_move(obs).unwrap_or_else(|| random_move(&obs.available_directions, rng))
}

/// Provider running one of the built-in strategies
#[derive(Debug, Clone)]
pub struct LocalStrategyProvider {
    kind: StrategyKind,
    seed: u64,
}

impl LocalStrategyProvider {
    pub fn new(kind: StrategyKind, seed: u64) -> Self {
        Self { kind, seed }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn choose(&self, obs: &Observation) -> Direction {
        let mut rng = ChaCha8Rng::seed_from_u64(observation_seed(self.seed, obs));
        match self.kind {
            StrategyKind::Random => random_move(&obs.available_directions, &mut rng),
            StrategyKind::Greedy => greedy_move(obs).unwrap_or(Direction::Stay),
            StrategyKind::Straight => straight_move(obs, &mut rng),
            StrategyKind::Directional => directional_move(obs, &mut rng),
            StrategyKind::Social => social_move(obs, &mut rng),
        }
    }
}

#[async_trait]
impl DecisionProvider for LocalStrategyProvider {
    async fn decide(&self, observation: &Observation) -> Result<Direction, DecisionError> {
        Ok(self.choose(observation))
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Position, RunId};
    use crate::entity::agent::{Agent, Vitals};
    use crate::world::grid::GridWorld;
    use crate::world::maze::MazeDefinition;

    fn open_room() -> GridWorld {
        let maze = MazeDefinition::new(
            "room",
            "Room",
            &["#######", "#S....#", "#.....#", "#.....#", "#....C#", "#######"],
        );
        GridWorld::from_definition(&maze).unwrap()
    }

    fn observe(grid: &GridWorld, agents: &[Agent], index: usize) -> Observation {
        Observation::capture(RunId::new(), 4, &agents[index], agents, grid)
    }

    fn mouse(name: &str, x: i32, y: i32) -> Agent {
        Agent::new(name, Position::new(x, y), Vitals::full(100, 100), 500)
    }

    #[test]
    fn test_strategy_names() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!("smart".parse::<StrategyKind>().unwrap(), StrategyKind::Greedy);
        assert!("teleport".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_greedy_larger_axis_first() {
        let grid = open_room();
        // resource at (5,4): dx=4, dy=3 from (1,1)
        let obs = observe(&grid, &[mouse("a", 1, 1)], 0);
        assert_eq!(greedy_move(&obs), Some(Direction::East));

        // dx=1, dy=3 from (4,1)
        let obs = observe(&grid, &[mouse("a", 4, 1)], 0);
        assert_eq!(greedy_move(&obs), Some(Direction::South));
    }

    #[test]
    fn test_greedy_secondary_axis_when_blocked() {
        // wall directly east
        let maze = MazeDefinition::new("w", "W", &["#####", "#S#.#", "#...#", "#..C#", "#####"]);
        let grid = GridWorld::from_definition(&maze).unwrap();
        let obs = observe(&grid, &[mouse("a", 1, 1)], 0);
        // dx=2, dy=2: east first (blocked), then south
        assert_eq!(greedy_move(&obs), Some(Direction::South));
    }

    #[test]
    fn test_greedy_without_resources_stays() {
        let maze = MazeDefinition::new("e", "E", &["####", "#S.#", "####"]);
        let grid = GridWorld::from_definition(&maze).unwrap();
        let provider = LocalStrategyProvider::new(StrategyKind::Greedy, 1);
        let obs = observe(&grid, &[mouse("a", 1, 1)], 0);
        assert_eq!(provider.choose(&obs), Direction::Stay);
    }

    #[test]
    fn test_straight_keeps_heading() {
        let grid = open_room();
        let mut a = mouse("a", 2, 2);
        a.last_direction = Some(Direction::West);
        let provider = LocalStrategyProvider::new(StrategyKind::Straight, 1);
        assert_eq!(provider.choose(&observe(&grid, &[a.clone()], 0)), Direction::West);

        // at the west wall it has to turn
        a.position = Position::new(1, 2);
        let turned = provider.choose(&observe(&grid, &[a], 0));
        assert!(turned.is_move());
        assert_ne!(turned, Direction::West);
    }

    #[test]
    fn test_random_is_legal_and_reproducible() {
        let grid = open_room();
        let provider = LocalStrategyProvider::new(StrategyKind::Random, 7);
        let obs = observe(&grid, &[mouse("a", 1, 1)], 0);
        let first = provider.choose(&obs);
        assert!(obs.can_move(first));
        for _ in 0..10 {
            assert_eq!(provider.choose(&obs), first);
        }
    }

    #[test]
    fn test_random_boxed_in_stays() {
        let maze = MazeDefinition::new("b", "B", &["###", "#S#", "###"]);
        let grid = GridWorld::from_definition(&maze).unwrap();
        let provider = LocalStrategyProvider::new(StrategyKind::Random, 7);
        assert_eq!(provider.choose(&observe(&grid, &[mouse("a", 1, 1)], 0)), Direction::Stay);
    }

    #[test]
    fn test_social_moves_towards_centroid() {
        let grid = open_room();
        let agents = [mouse("a", 1, 2), mouse("b", 5, 1), mouse("c", 5, 3)];
        let provider = LocalStrategyProvider::new(StrategyKind::Social, 3);
        assert_eq!(provider.choose(&observe(&grid, &agents, 0)), Direction::East);
    }

    #[test]
    fn test_social_alone_goes_for_resource() {
        let grid = open_room();
        let provider = LocalStrategyProvider::new(StrategyKind::Social, 3);
        assert_eq!(provider.choose(&observe(&grid, &[mouse("a", 1, 1)], 0)), Direction::East);
    }

    #[test]
    fn test_directional_prefers_dominant_axis() {
        let grid = open_room();
        let provider = LocalStrategyProvider::new(StrategyKind::Directional, 3);
        // dx=1, dy=3
        assert_eq!(provider.choose(&observe(&grid, &[mouse("a", 4, 1)], 0)), Direction::South);
    }
}
