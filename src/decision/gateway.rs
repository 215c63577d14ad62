//! Decision gateway: bounded wait plus random fallback
//!
//! `decide` never fails. A provider that times out, errors or answers with
//! garbage is replaced by a uniformly random open direction, drawn from a
//! seeded stream so fallbacks replay identically.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::types::Direction;
use crate::decision::observation::Observation;
use crate::decision::provider::{DecisionError, DecisionProvider};
use crate::decision::strategies::{observation_seed, random_move};

/// Where a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub direction: Direction,
    pub source: DecisionSource,
}

impl Decision {
    pub fn is_fallback(&self) -> bool {
        self.source == DecisionSource::Fallback
    }
}

pub struct DecisionGateway {
    provider: Arc<dyn DecisionProvider>,
    timeout: Duration,
    seed: u64,
    fallbacks: AtomicU64,
}

impl DecisionGateway {
    pub fn new(provider: Arc<dyn DecisionProvider>, timeout: Duration, seed: u64) -> Self {
        Self {
            provider,
            timeout,
            seed,
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Number of decisions that fell back to a random move
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Ask the provider for a move, waiting at most `timeout`
    pub async fn decide(&self, observation: &Observation) -> Decision {
        let outcome = match tokio::time::timeout(self.timeout, self.provider.decide(observation)).await {
            Ok(result) => result,
            Err(_) => Err(DecisionError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(direction) => Decision {
                direction,
                source: DecisionSource::Provider,
            },
            Err(err) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                let direction = self.fallback(observation);
                tracing::warn!(
                    run_id = %observation.run_id,
                    agent = %observation.agent_name,
                    turn = observation.turn,
                    provider = self.provider.name(),
                    error = %err,
                    fallback = %direction,
                    "Decision unavailable, using random move"
                );
                Decision {
                    direction,
                    source: DecisionSource::Fallback,
                }
            }
        }
    }

    /// Random open direction for this observation; `Stay` when boxed in
    pub fn fallback(&self, observation: &Observation) -> Direction {
        let mut rng = ChaCha8Rng::seed_from_u64(observation_seed(self.seed, observation));
        random_move(&observation.available_directions, &mut rng)
    }
}
