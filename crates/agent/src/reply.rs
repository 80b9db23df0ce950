//! Parsing of raw model replies into JSON objects.

use serde_json::{Map, Value};
use wellcoach_core::agent::AgentRole;
use wellcoach_core::error::StepError;

/// Strip a surrounding markdown code fence (```` ```json ... ``` ````), if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. `json`) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse an agent reply. Anything other than a JSON object is a failure.
pub fn parse_reply(role: AgentRole, raw: &str) -> Result<Map<String, Value>, StepError> {
    let failure = |reason: String| StepError::JsonParseFailure {
        agent: role.config_key().to_string(),
        reason,
    };

    match serde_json::from_str::<Value>(strip_code_fences(raw)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(failure(format!("expected a JSON object, got {}", kind(&other)))),
        Err(e) => Err(failure(e.to_string())),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
