//! Decision provider abstraction
//!
//! A provider turns an [`Observation`] into a [`Direction`]. It may be slow,
//! fail or be unreachable; the gateway wraps every provider with a timeout
//! and a random fallback, so implementations just report what went wrong.

use ahash::AHashMap;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::core::error::MazeError;
use crate::core::types::Direction;
use crate::decision::observation::Observation;

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider answered with status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<DecisionError> for MazeError {
    fn from(err: DecisionError) -> Self {
        MazeError::DecisionUnavailable(err.to_string())
    }
}

/// Source of per-turn moves.
///
/// # Implementations
///
/// - [`HttpDecisionProvider`](crate::decision::client::HttpDecisionProvider): external service
/// - [`LocalStrategyProvider`](crate::decision::strategies::LocalStrategyProvider): in-process
/// - [`StrategyRouter`]: dispatch on the agent's strategy id
#[async_trait]
pub trait DecisionProvider: Send + Sync + 'static {
    /// Choose a direction for the observed agent. Must not block the runtime.
    async fn decide(&self, observation: &Observation) -> Result<Direction, DecisionError>;

    /// Short label used in logs
    fn name(&self) -> &str;
}

/// Routes each decision to a provider chosen by the agent's strategy id
pub struct StrategyRouter {
    routes: AHashMap<String, Arc<dyn DecisionProvider>>,
    default: Arc<dyn DecisionProvider>,
}

impl StrategyRouter {
    pub fn new(default: Arc<dyn DecisionProvider>) -> Self {
        Self {
            routes: AHashMap::new(),
            default,
        }
    }

    pub fn route(mut self, strategy: impl Into<String>, provider: Arc<dyn DecisionProvider>) -> Self {
        self.routes.insert(strategy.into().to_ascii_lowercase(), provider);
        self
    }

    pub fn provider_for(&self, strategy: Option<&str>) -> &Arc<dyn DecisionProvider> {
        strategy
            .and_then(|s| self.routes.get(&s.to_ascii_lowercase()))
            .unwrap_or(&self.default)
    }
}

#[async_trait]
impl DecisionProvider for StrategyRouter {
    async fn decide(&self, observation: &Observation) -> Result<Direction, DecisionError> {
        self.provider_for(observation.strategy.as_deref())
            .decide(observation)
            .await
    }

    fn name(&self) -> &str {
        "router"
    }
}
