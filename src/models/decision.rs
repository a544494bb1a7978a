use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventData {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEventData {
    #[serde(rename = "eventId", alias = "event_id", default)]
    pub event_id: String,
}

/// A single calendar mutation requested by the model.
///
/// Wire shape: `{"type": "create" | "delete", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Action {
    Create(CreateEventData),
    Delete(DeleteEventData),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionValidationError {
    #[error("{kind} action is missing required field(s): {fields}")]
    MissingField { kind: &'static str, fields: String },
    #[error("malformed action: {0}")]
    Malformed(String),
}

impl Action {
    pub fn create(
        summary: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Action::Create(CreateEventData {
            summary: summary.into(),
            start: start.into(),
            end: end.into(),
        })
    }

    pub fn delete(event_id: impl Into<String>) -> Self {
        Action::Delete(DeleteEventData {
            event_id: event_id.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Create(_) => "create",
            Action::Delete(_) => "delete",
        }
    }

    pub fn validate(&self) -> Result<(), ActionValidationError> {
        let missing: Vec<&str> = match self {
            Action::Create(data) => [
                ("summary", &data.summary),
                ("start", &data.start),
                ("end", &data.end),
            ]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect(),
            Action::Delete(data) if data.event_id.trim().is_empty() => vec!["eventId"],
            Action::Delete(_) => Vec::new(),
        };

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ActionValidationError::MissingField {
                kind: self.kind(),
                fields: missing.join(", "),
            })
        }
    }

    /// Short human description used in progress messages.
    pub fn describe(&self) -> String {
        match self {
            Action::Create(data) => format!("Scheduling: {}", data.summary),
            Action::Delete(data) => format!("Deleting event {}", data.event_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRejection {
    pub reason: String,
    pub raw: String,
}

/// One entry of the model's action list, kept at its original position
/// whether or not it passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposedAction {
    Valid(Action),
    Rejected(ActionRejection),
}

impl From<Action> for ProposedAction {
    fn from(action: Action) -> Self {
        ProposedAction::Valid(action)
    }
}

impl From<ActionRejection> for ProposedAction {
    fn from(rejection: ActionRejection) -> Self {
        ProposedAction::Rejected(rejection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decision {
    pub response_text: String,
    pub proposals: Vec<ProposedAction>,
}

impl Decision {
    pub fn reply_only(text: impl Into<String>) -> Self {
        Self {
            response_text: text.into(),
            proposals: Vec::new(),
        }
    }

    pub fn actions(&self) -> Vec<&Action> {
        self.proposals
            .iter()
            .filter_map(|p| match p {
                ProposedAction::Valid(action) => Some(action),
                ProposedAction::Rejected(_) => None,
            })
            .collect()
    }

    pub fn rejected(&self) -> Vec<&ActionRejection> {
        self.proposals
            .iter()
            .filter_map(|p| match p {
                ProposedAction::Rejected(rejection) => Some(rejection),
                ProposedAction::Valid(_) => None,
            })
            .collect()
    }
}
