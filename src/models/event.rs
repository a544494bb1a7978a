use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// Upper bound on how many upcoming events are shown to the model.
pub const MAX_CONTEXT_EVENTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStart {
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl EventStart {
    // All-day events sort at the start of their day.
    pub fn sort_key(&self) -> DateTime<FixedOffset> {
        match self {
            EventStart::DateTime(dt) => *dt,
            EventStart::Date(date) => date.and_time(NaiveTime::MIN).and_utc().fixed_offset(),
        }
    }
}

impl fmt::Display for EventStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStart::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            EventStart::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
    pub start: EventStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user_text: String,
    pub calendar_context: Vec<EventSummary>,
}

impl ChatTurn {
    pub fn new(user_text: impl Into<String>, calendar_context: Vec<EventSummary>) -> Self {
        Self {
            user_text: user_text.into(),
            calendar_context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_day_events_sort_before_same_day_timed_events() {
        let date = EventStart::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        let timed = EventStart::DateTime(
            DateTime::parse_from_rfc3339("2026-03-01T09:00:00+00:00").unwrap(),
        );
        assert!(date.sort_key() < timed.sort_key());
    }

    #[test]
    fn display_uses_iso_forms() {
        let date = EventStart::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(date.to_string(), "2026-03-01");
        let timed = EventStart::DateTime(
            DateTime::parse_from_rfc3339("2026-03-01T09:00:00-05:00").unwrap(),
        );
        assert_eq!(timed.to_string(), "2026-03-01T09:00:00-05:00");
    }
}
