use std::sync::Arc;

use calendarBot::events::queue::EventBus;
use calendarBot::events::worker::run_event_worker;
use calendarBot::handlers::action::{ActionExecutor, ActionOutcome};
use calendarBot::handlers::chat::{ChatOrchestrator, TurnOutcome};
use calendarBot::models::event::{CreatedEvent, EventStart, EventSummary};
use calendarBot::service::backend::{BackendAdapter, BackendError, BackendRequest, ModelVariant, RequestShape};
use calendarBot::service::calendar::{CalendarClient, CalendarError};
use calendarBot::service::context_builder::ContextBuilder;
use calendarBot::service::notifier::{Notification, Notifier};
use calendarBot::service::selector::{BackendSelector, Candidate};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

struct FakeBackend {
    response: Result<String, BackendError>,
    prompts: Mutex<Vec<BackendRequest>>,
}

impl FakeBackend {
    fn new(response: Result<String, BackendError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl BackendAdapter for FakeBackend {
    fn id(&self) -> &str {
        "fake"
    }

    async fn send(
        &self,
        request: &BackendRequest,
        _variant: &ModelVariant,
    ) -> Result<String, BackendError> {
        self.prompts.lock().await.push(request.clone());
        self.response.clone()
    }
}

#[derive(Default)]
struct FakeCalendar {
    events: Mutex<Vec<EventSummary>>,
    creates: Mutex<Vec<(String, String, String)>>,
    list_calls: Mutex<usize>,
}

#[async_trait::async_trait]
impl CalendarClient for FakeCalendar {
    async fn list_upcoming(
        &self,
        _now: DateTime<Utc>,
        _max: usize,
    ) -> Result<Vec<EventSummary>, CalendarError> {
        *self.list_calls.lock().await += 1;
        Ok(self.events.lock().await.clone())
    }

    async fn create_event(
        &self,
        summary: &str,
        start: &str,
        end: &str,
    ) -> Result<CreatedEvent, CalendarError> {
        self.creates
            .lock()
            .await
            .push((summary.to_string(), start.to_string(), end.to_string()));
        let id = format!("evt-{}", self.creates.lock().await.len());
        self.events.lock().await.push(EventSummary {
            id: id.clone(),
            title: summary.to_string(),
            start: EventStart::DateTime((Utc::now() + Duration::days(1)).fixed_offset()),
        });
        Ok(CreatedEvent {
            link: Some(format!("https://calendar.example/{id}")),
            id,
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.id != event_id);
        if events.len() == before {
            return Err(CalendarError::Api {
                status: 404,
                message: "Not Found".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.seen.lock().await.push(notification);
    }
}

fn orchestrator(
    backend: Arc<FakeBackend>,
    calendar: Arc<FakeCalendar>,
    notifier: Arc<RecordingNotifier>,
) -> ChatOrchestrator {
    ChatOrchestrator::new(
        ContextBuilder::new(calendar.clone()),
        BackendSelector::new(vec![Candidate::new(
            backend,
            ModelVariant::new("test-model", RequestShape::JsonMode),
        )]),
        ActionExecutor::new(calendar, notifier.clone()),
        notifier,
        chrono_tz::Tz::UTC,
    )
}

#[tokio::test]
async fn schedule_lunch_through_the_worker() {
    let backend = FakeBackend::new(Ok(r#"{"response_text":"Agendado.","actions":[{"type":"create","data":{"summary":"Lunch","start":"2025-01-01T12:00:00","end":"2025-01-01T13:00:00"}}]}"#.to_string()));
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let (bus, rx) = EventBus::new(1);
    let worker = tokio::spawn(run_event_worker(
        rx,
        orchestrator(backend.clone(), calendar.clone(), notifier.clone()),
    ));

    let outcome = bus
        .submit("Schedule Lunch at 2025-01-01T12:00:00 to 2025-01-01T13:00:00")
        .await
        .expect("worker answers");
    drop(bus);
    let _ = worker.await;

    assert_eq!(
        *calendar.creates.lock().await,
        vec![(
            "Lunch".to_string(),
            "2025-01-01T12:00:00".to_string(),
            "2025-01-01T13:00:00".to_string()
        )]
    );

    let prompts = backend.prompts.lock().await;
    assert_eq!(
        prompts[0].user_text,
        "Schedule Lunch at 2025-01-01T12:00:00 to 2025-01-01T13:00:00"
    );
    assert!(prompts[0].system_prompt.contains("NO UPCOMING EVENTS."));

    let seen = notifier.seen.lock().await;
    assert_eq!(seen[0], Notification::Thinking);
    assert_eq!(seen[1], Notification::Reply("Agendado.".to_string()));
    assert!(seen.iter().any(|n| n.to_string().contains("Agendado.")));
    assert!(matches!(seen.last(), Some(Notification::ActionSucceeded { .. })));

    match outcome {
        TurnOutcome::Completed {
            report,
            refreshed_context,
            ..
        } => {
            assert!(matches!(report.outcomes[0], ActionOutcome::Created { .. }));
            let refreshed = refreshed_context.expect("context refreshed after actions");
            assert_eq!(refreshed.len(), 1);
            assert_eq!(refreshed[0].title, "Lunch");
        }
        other => panic!("expected completed turn, got {other:?}"),
    }
    assert_eq!(*calendar.list_calls.lock().await, 2);
}

#[tokio::test]
async fn agenda_ids_reach_the_prompt_and_deletes_run() {
    let backend = FakeBackend::new(Ok(
        "Okay!\n{\"response_text\":\"Deleted.\",\"action\":{\"type\":\"delete\",\"data\":{\"eventId\":\"gym-7\"}}}".to_string(),
    ));
    let calendar = Arc::new(FakeCalendar::default());
    calendar.events.lock().await.push(EventSummary {
        id: "gym-7".to_string(),
        title: "Gym".to_string(),
        start: EventStart::DateTime((Utc::now() + Duration::hours(5)).fixed_offset()),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = orchestrator(backend.clone(), calendar.clone(), notifier.clone());

    let outcome = orchestrator.handle_turn("delete my gym session").await;

    assert!(backend.prompts.lock().await[0]
        .system_prompt
        .contains("- ID: gym-7 | Title: Gym"));
    assert!(calendar.events.lock().await.is_empty());
    match outcome {
        TurnOutcome::Completed {
            refreshed_context: Some(refreshed),
            ..
        } => assert!(refreshed.is_empty()),
        other => panic!("expected refreshed context, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_actions_are_surfaced_not_executed() {
    let backend = FakeBackend::new(Ok(r#"{"response_text":"Booked.","actions":[{"type":"create","data":{"summary":"Call","start":"2025-03-01T10:00:00"}}]}"#.to_string()));
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = orchestrator(backend, calendar.clone(), notifier.clone());

    let outcome = orchestrator.handle_turn("book a call").await;

    assert!(calendar.creates.lock().await.is_empty());
    let seen = notifier.seen.lock().await;
    assert_eq!(seen[1], Notification::Reply("Booked.".to_string()));
    match &seen[2] {
        Notification::ActionRejected(reason) => assert!(reason.contains("end")),
        other => panic!("expected rejection, got {other:?}"),
    }
    match outcome {
        TurnOutcome::Completed {
            refreshed_context, ..
        } => assert!(refreshed_context.is_none()),
        other => panic!("expected completed turn, got {other:?}"),
    }
}

#[tokio::test]
async fn rejections_are_reported_in_proposal_order() {
    let backend = FakeBackend::new(Ok(r#"{"response_text":"ok","actions":[
        {"type":"create","data":{"summary":"Lunch","start":"2025-01-01T12:00:00","end":"2025-01-01T13:00:00"}},
        {"type":"delete","data":{}}
    ]}"#.to_string()));
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = orchestrator(backend, calendar.clone(), notifier.clone());

    let outcome = orchestrator.handle_turn("lunch tomorrow and delete that thing").await;

    assert_eq!(calendar.creates.lock().await.len(), 1);
    let seen = notifier.seen.lock().await;
    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0], Notification::Thinking);
    assert_eq!(seen[1], Notification::Reply("ok".to_string()));
    assert_eq!(seen[2], Notification::ActionStarted("Scheduling: Lunch".to_string()));
    assert!(matches!(seen[3], Notification::ActionSucceeded { .. }));
    match &seen[4] {
        Notification::ActionRejected(reason) => assert!(reason.contains("eventId")),
        other => panic!("expected rejection last, got {other:?}"),
    }
    match outcome {
        TurnOutcome::Completed { report, .. } => {
            assert!(matches!(report.outcomes[0], ActionOutcome::Created { .. }));
            assert!(matches!(report.outcomes[1], ActionOutcome::Rejected { .. }));
        }
        other => panic!("expected completed turn, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_output_is_shown_as_text() {
    let backend = FakeBackend::new(Ok("I can't access calendars right now.".to_string()));
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = orchestrator(backend, calendar, notifier.clone());

    orchestrator.handle_turn("hi").await;

    let seen = notifier.seen.lock().await;
    assert_eq!(
        *seen,
        vec![
            Notification::Thinking,
            Notification::Reply("I can't access calendars right now.".to_string()),
        ]
    );
}

#[tokio::test]
async fn blocked_reply_ends_the_turn() {
    let backend = FakeBackend::new(Err(BackendError::Blocked(
        "Blocked for safety (test-model): SAFETY".to_string(),
    )));
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = orchestrator(backend, calendar, notifier.clone());

    let outcome = orchestrator.handle_turn("something unsafe").await;

    assert_eq!(
        outcome,
        TurnOutcome::Blocked {
            message: "Blocked for safety (test-model): SAFETY".to_string()
        }
    );
    let seen = notifier.seen.lock().await;
    assert_eq!(
        seen.last(),
        Some(&Notification::Reply("Blocked for safety (test-model): SAFETY".to_string()))
    );
}

#[tokio::test]
async fn exhausted_backends_leave_the_next_turn_working() {
    let failing = FakeBackend::new(Err(BackendError::Unreachable("connection refused".to_string())));
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = orchestrator(failing, calendar.clone(), notifier.clone());

    let first = orchestrator.handle_turn("hello").await;
    assert!(matches!(first, TurnOutcome::Exhausted { .. }));
    let second = orchestrator.handle_turn("hello again").await;
    assert!(matches!(second, TurnOutcome::Exhausted { .. }));

    let seen = notifier.seen.lock().await;
    assert_eq!(seen.len(), 4);
    assert!(seen[1].to_string().contains("connection refused"));
    assert_eq!(*calendar.list_calls.lock().await, 2);
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let backend = FakeBackend::new(Ok("{}".to_string()));
    let calendar = Arc::new(FakeCalendar::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = orchestrator(backend.clone(), calendar, notifier.clone());

    assert_eq!(orchestrator.handle_turn("   ").await, TurnOutcome::Ignored);
    assert!(backend.prompts.lock().await.is_empty());
    assert!(notifier.seen.lock().await.is_empty());
}
