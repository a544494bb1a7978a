use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::event::{EventStart, EventSummary, MAX_CONTEXT_EVENTS};
use crate::service::calendar::CalendarClient;

pub const NO_EVENTS: &str = "NO UPCOMING EVENTS.";

/// Builds the calendar state the model reasons about. Always a fresh read.
pub struct ContextBuilder {
    calendar: Arc<dyn CalendarClient>,
}

impl ContextBuilder {
    pub fn new(calendar: Arc<dyn CalendarClient>) -> Self {
        Self { calendar }
    }

    pub async fn build(&self) -> Vec<EventSummary> {
        let now = Utc::now();
        match self.calendar.list_upcoming(now, MAX_CONTEXT_EVENTS).await {
            Ok(mut events) => {
                events.retain(|event| event.start.sort_key() >= now || is_all_day_today(event, now));
                events.sort_by_key(|event| event.start.sort_key());
                events.truncate(MAX_CONTEXT_EVENTS);
                debug!(count = events.len(), "calendar context refreshed");
                events
            }
            Err(err) => {
                warn!(error = %err, "failed to read calendar, continuing without context");
                Vec::new()
            }
        }
    }
}

// All-day events report midnight as their start, which is already in the past
// for the current day even though the calendar considers them upcoming.
fn is_all_day_today(event: &EventSummary, now: DateTime<Utc>) -> bool {
    matches!(event.start, EventStart::Date(date) if date >= now.date_naive())
}

pub fn render_agenda(events: &[EventSummary]) -> String {
    if events.is_empty() {
        return NO_EVENTS.to_string();
    }
    events
        .iter()
        .map(|event| format!("- ID: {} | Title: {} | Start: {}", event.id, event.title, event.start))
        .collect::<Vec<_>>()
        .join("\n")
}
