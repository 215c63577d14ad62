//! Engine configuration with documented constants
//!
//! Every tunable of the scheduler, the decision gateway and the publish side
//! lives here. Values come from `Default`, an optional TOML file, and a small
//! set of environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::error::{MazeError, Result};

/// How agents are scheduled against each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Discipline {
    /// One global tick moves every alive agent once, in agent-list order
    #[default]
    Lockstep,
    /// Each agent runs on its own think-interval timer
    PerAgent,
}

impl std::str::FromStr for Discipline {
    type Err = MazeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lockstep" => Ok(Discipline::Lockstep),
            "per-agent" | "per_agent" | "async" => Ok(Discipline::PerAgent),
            other => Err(MazeError::config(format!("unknown discipline '{}'", other))),
        }
    }
}

/// Configuration for the simulation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === SCHEDULING ===
    /// Scheduling discipline for new runs
    pub discipline: Discipline,

    /// Manhattan radius within which another alive agent counts as "nearby"
    ///
    /// Drives the proximity bonus / isolation penalty split of the rule engine.
    pub proximity_radius: u32,

    /// Optional hard cap on turns. `None` lets a run continue until a
    /// termination condition or an explicit stop.
    pub max_turns: Option<u64>,

    // === DECISION GATEWAY ===
    /// Bounded wait for one decision (milliseconds)
    ///
    /// A provider that does not answer within this window is treated as
    /// unavailable and the gateway falls back to a random legal move.
    pub decision_timeout_ms: u64,

    /// Endpoint of the external decision service, if any
    pub decision_url: Option<String>,

    /// Seed for the fallback RNG and local strategies
    ///
    /// Identical seeds give identical fallback choices, which keeps replays
    /// reproducible even when the provider is unreachable.
    pub rng_seed: u64,

    // === PUBLISHING ===
    /// Minimum spacing between two turn events published to subscribers
    ///
    /// Status changes and the final event always go out immediately.
    pub publish_min_interval_ms: u64,

    /// Buffer size of the broadcast channel; slow subscribers lag past this
    pub event_channel_capacity: usize,

    // === PERSISTENCE ===
    /// Save the run to the store every N committed turns (0 = only at the end)
    pub persist_every_turns: u64,

    // === RUN MANAGER ===
    /// Finished runs older than this are dropped by `purge_expired`
    pub run_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discipline: Discipline::Lockstep,
            proximity_radius: 2,
            max_turns: None,

            decision_timeout_ms: 4_000,
            decision_url: None,
            rng_seed: 42,

            publish_min_interval_ms: 200,
            event_channel_capacity: 1024,

            persist_every_turns: 10,

            run_ttl_secs: 3_600,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file; missing keys take their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    ///
    /// Optional: MAZE_DECISION_URL
    /// Optional: MAZE_DECISION_TIMEOUT_MS
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("MAZE_DECISION_URL") {
            if !url.trim().is_empty() {
                self.decision_url = Some(url);
            }
        }
        if let Ok(raw) = std::env::var("MAZE_DECISION_TIMEOUT_MS") {
            self.decision_timeout_ms = raw.trim().parse().map_err(|_| {
                MazeError::config(format!("MAZE_DECISION_TIMEOUT_MS is not a number: {}", raw))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    pub fn publish_min_interval(&self) -> Duration {
        Duration::from_millis(self.publish_min_interval_ms)
    }

    pub fn run_ttl(&self) -> Duration {
        Duration::from_secs(self.run_ttl_secs)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.decision_timeout_ms == 0 {
            return Err(MazeError::config("decision_timeout_ms must be positive"));
        }
        if self.event_channel_capacity == 0 {
            return Err(MazeError::config("event_channel_capacity must be positive"));
        }
        if let Some(url) = &self.decision_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(MazeError::config(format!(
                    "decision_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        if self.max_turns == Some(0) {
            return Err(MazeError::config("max_turns must be positive when set"));
        }
        Ok(())
    }
}
