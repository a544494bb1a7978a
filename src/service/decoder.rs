//! Turns raw model output into a [`Decision`].
//!
//! Model output is not guaranteed to be well formed, so decoding never fails:
//!
//! 1. strict JSON parse of the whole text,
//! 2. strict parse of the span from the first `{` to the last `}`,
//! 3. the same two candidates again after escaping raw control characters
//!    found inside string literals,
//! 4. otherwise the raw text becomes the reply with no actions.
//!
//! The span scan is a heuristic, not a parser: it does not look inside string
//! literals, so a stray `}` in prose after the object makes the span invalid
//! and decoding degrades to step 4.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::decision::{
    Action, ActionRejection, ActionValidationError, Decision, ProposedAction,
};

pub fn decode_decision(raw: &str) -> Decision {
    match parse_object(raw) {
        Some(object) => normalize(object),
        None => {
            debug!("model output is not structured, using it as the reply");
            Decision::reply_only(raw)
        }
    }
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    let span = brace_span(trimmed);

    let strict = std::iter::once(trimmed).chain(span);
    for candidate in strict {
        if let Some(object) = strict_object(candidate) {
            return Some(object);
        }
    }

    let repaired = std::iter::once(trimmed).chain(span).map(escape_control_in_strings);
    for candidate in repaired {
        if let Some(object) = strict_object(&candidate) {
            debug!("model output parsed after escaping control characters");
            return Some(object);
        }
    }
    None
}

fn strict_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// First `{` through the last `}`, inclusive.
pub fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Escapes newlines, carriage returns and tabs that appear unescaped inside
/// JSON string literals. Structural whitespace is left alone.
pub fn escape_control_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

fn normalize(mut object: Map<String, Value>) -> Decision {
    let response_text = match object.remove("response_text") {
        Some(Value::String(text)) => text,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    // `actions` wins over the legacy single `action` field. A lone value in
    // either is treated as a one-element list and validated like any other.
    let raw_actions = match (object.remove("actions"), object.remove("action")) {
        (Some(Value::Array(items)), _) => items,
        (Some(Value::Null) | None, Some(Value::Array(items))) => items,
        (Some(Value::Null) | None, Some(Value::Null) | None) => Vec::new(),
        (Some(Value::Null) | None, Some(single)) => vec![single],
        (Some(single), _) => vec![single],
    };

    let proposals = raw_actions
        .into_iter()
        .map(|raw| match validate_action(&raw) {
            Ok(action) => ProposedAction::Valid(action),
            Err(err) => {
                warn!(reason = %err, action = %raw, "dropping invalid action");
                ProposedAction::Rejected(ActionRejection {
                    reason: err.to_string(),
                    raw: raw.to_string(),
                })
            }
        })
        .collect();

    Decision {
        response_text,
        proposals,
    }
}

fn validate_action(raw: &Value) -> Result<Action, ActionValidationError> {
    let action: Action = serde_json::from_value(raw.clone())
        .map_err(|err| ActionValidationError::Malformed(err.to_string()))?;
    action.validate()?;
    Ok(action)
}
