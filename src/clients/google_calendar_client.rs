use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::models::event::{CreatedEvent, EventStart, EventSummary};
use crate::service::calendar::{CalendarClient, CalendarError};

const EVENT_DESCRIPTION: &str = "Created by calendarBot";

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: String,
    summary: Option<String>,
    status: Option<String>,
    start: Option<ApiEventTime>,
    html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<DateTime<chrono::FixedOffset>>,
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewEventTime<'a> {
    date_time: &'a str,
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
struct NewEvent<'a> {
    summary: &'a str,
    description: &'a str,
    start: NewEventTime<'a>,
    end: NewEventTime<'a>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Google Calendar v3, primary calendar, bearer token auth.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    timezone: Tz,
}

impl GoogleCalendarClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>, timezone: Tz) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timezone,
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }
}

fn api_error(status: StatusCode, body: &str) -> CalendarError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("")).trim().to_string());
    CalendarError::Api {
        status: status.as_u16(),
        message,
    }
}

fn to_summaries(list: EventList) -> Vec<EventSummary> {
    list.items
        .into_iter()
        .filter(|event| event.status.as_deref() != Some("cancelled"))
        .filter_map(|event| {
            let start = event.start?;
            let start = match (start.date_time, start.date) {
                (Some(dt), _) => EventStart::DateTime(dt),
                (None, Some(date)) => EventStart::Date(date),
                (None, None) => return None,
            };
            Some(EventSummary {
                id: event.id,
                title: event.summary.unwrap_or_else(|| "(no title)".to_string()),
                start,
            })
        })
        .collect()
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn list_upcoming(
        &self,
        now: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<EventSummary>, CalendarError> {
        let time_min = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = max.to_string();
        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(&self.token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("showDeleted", "false"),
                ("singleEvents", "true"),
                ("maxResults", max_results.as_str()),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;
        let list: EventList = Self::check(response).await?.json().await?;
        Ok(to_summaries(list))
    }

    async fn create_event(
        &self,
        summary: &str,
        start: &str,
        end: &str,
    ) -> Result<CreatedEvent, CalendarError> {
        let event = NewEvent {
            summary,
            description: EVENT_DESCRIPTION,
            start: NewEventTime {
                date_time: start,
                time_zone: self.timezone.name(),
            },
            end: NewEventTime {
                date_time: end,
                time_zone: self.timezone.name(),
            },
        };
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(&self.token)
            .json(&event)
            .send()
            .await?;
        let created: ApiEvent = Self::check(response).await?.json().await?;
        Ok(CreatedEvent {
            id: created.id,
            link: created.html_link,
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let url = format!("{}/{}", self.events_url(), event_id);
        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
