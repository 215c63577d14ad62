//! Parse decision service responses into directions

use serde::Deserialize;

use crate::core::types::Direction;
use crate::decision::provider::DecisionError;

/// Response body of a decision service. Either field may carry the token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default, rename = "move")]
    pub move_: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl DecisionResponse {
    pub fn token(&self) -> Option<&str> {
        self.direction.as_deref().or(self.move_.as_deref())
    }
}

/// Extract the outermost JSON object from text that may carry extra prose
pub fn extract_json(text: &str) -> Result<&str, DecisionError> {
    let start = text
        .find('{')
        .ok_or_else(|| DecisionError::Malformed("no JSON object found".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| DecisionError::Malformed("unterminated JSON object".into()))?;
    if end < start {
        return Err(DecisionError::Malformed("unterminated JSON object".into()));
    }
    Ok(&text[start..=end])
}

/// Parse a response body
///
/// Accepts a JSON object with `direction` or `move`, a bare JSON string, or a
/// bare token. Unknown tokens are malformed.
pub fn parse_decision(body: &str) -> Result<Direction, DecisionError> {
    let trimmed = body.trim();
    if let Some(direction) = Direction::from_token(trimmed.trim_matches('"')) {
        return Ok(direction);
    }

    let json = extract_json(trimmed)?;
    let response: DecisionResponse =
        serde_json::from_str(json).map_err(|e| DecisionError::Malformed(e.to_string()))?;
    let token = response
        .token()
        .ok_or_else(|| DecisionError::Malformed("missing 'direction' or 'move' field".into()))?;

    Direction::from_token(token)
        .ok_or_else(|| DecisionError::Malformed(format!("unknown direction token '{}'", token)))
}
