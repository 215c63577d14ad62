//! HTTP decision provider
//!
//! Posts the observation as JSON to an external service and reads a
//! direction token back. Any transport failure, non-2xx status or unreadable
//! body is reported as a [`DecisionError`]; the gateway decides what to do.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::core::config::EngineConfig;
use crate::core::error::{MazeError, Result};
use crate::core::types::Direction;
use crate::decision::observation::Observation;
use crate::decision::parser::parse_decision;
use crate::decision::provider::{DecisionError, DecisionProvider};

/// Client for an external decision service
pub struct HttpDecisionProvider {
    client: Client,
    url: String,
}

impl HttpDecisionProvider {
    /// Create a provider posting to `url`. `timeout` bounds the whole request
    /// on the client side as well.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MazeError::config(format!("decision url must be http(s): {}", url)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MazeError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }

    /// Create a provider from environment variables
    ///
    /// Required: MAZE_DECISION_URL
    /// Optional: MAZE_DECISION_TIMEOUT_MS (defaults to 4000)
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("MAZE_DECISION_URL")
            .map_err(|_| MazeError::config("MAZE_DECISION_URL not set"))?;
        let timeout_ms = std::env::var("MAZE_DECISION_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(4_000);
        Self::new(url, Duration::from_millis(timeout_ms))
    }

    /// Build from engine configuration; `None` when no URL is configured
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>> {
        match &config.decision_url {
            Some(url) => Self::new(url.clone(), config.decision_timeout()).map(Some),
            None => Ok(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DecisionProvider for HttpDecisionProvider {
    async fn decide(&self, observation: &Observation) -> std::result::Result<Direction, DecisionError> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(&observation.to_request())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecisionError::Transport(format!("request timed out: {}", e))
                } else {
                    DecisionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecisionError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DecisionError::Transport(e.to_string()))?;

        parse_decision(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}
