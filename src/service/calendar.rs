use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::event::{CreatedEvent, EventSummary};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("calendar unreachable: {0}")]
    Unreachable(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("unexpected calendar response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CalendarError::InvalidResponse(err.to_string())
        } else {
            CalendarError::Unreachable(err.to_string())
        }
    }
}

/// The user's primary calendar.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Non-cancelled events starting at or after `now`, earliest first.
    async fn list_upcoming(
        &self,
        now: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<EventSummary>, CalendarError>;

    async fn create_event(
        &self,
        summary: &str,
        start: &str,
        end: &str,
    ) -> Result<CreatedEvent, CalendarError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError>;
}
