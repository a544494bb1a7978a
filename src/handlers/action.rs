use std::sync::Arc;

use tracing::{error, info, warn};

use crate::models::decision::{Action, ActionRejection, ProposedAction};
use crate::service::calendar::CalendarClient;
use crate::service::notifier::{Notification, Notifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Created { id: String, link: Option<String> },
    Deleted { event_id: String },
    Failed { error: String },
    Rejected { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ActionOutcome::Created { .. } | ActionOutcome::Deleted { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Whether anything reached the calendar, successfully or not.
    pub fn dispatched(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| !matches!(o, ActionOutcome::Rejected { .. }))
    }
}

/// Applies actions to the calendar one at a time, in the order proposed.
///
/// Rejected proposals are reported at their own position in the batch.
/// A failing action is reported and skipped; the rest of the batch still runs.
/// There is no rollback, so a partly failed batch leaves earlier writes in place.
pub struct ActionExecutor {
    calendar: Arc<dyn CalendarClient>,
    notifier: Arc<dyn Notifier>,
}

impl ActionExecutor {
    pub fn new(calendar: Arc<dyn CalendarClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { calendar, notifier }
    }

    pub async fn execute<I, P>(&self, proposals: I) -> ExecutionReport
    where
        I: IntoIterator<Item = P>,
        P: Into<ProposedAction>,
    {
        let mut report = ExecutionReport::default();
        for proposal in proposals {
            let outcome = match proposal.into() {
                ProposedAction::Valid(action) => self.execute_one(action).await,
                ProposedAction::Rejected(rejection) => self.report_rejection(rejection).await,
            };
            report.outcomes.push(outcome);
        }
        report
    }

    async fn report_rejection(&self, rejection: ActionRejection) -> ActionOutcome {
        warn!(reason = %rejection.reason, action = %rejection.raw, "skipping rejected action");
        self.notifier
            .notify(Notification::ActionRejected(format!(
                "{} ({})",
                rejection.reason, rejection.raw
            )))
            .await;
        ActionOutcome::Rejected {
            reason: rejection.reason,
        }
    }

    async fn execute_one(&self, action: Action) -> ActionOutcome {
        if let Err(err) = action.validate() {
            warn!(kind = action.kind(), reason = %err, "refusing invalid action");
            self.notifier
                .notify(Notification::ActionRejected(err.to_string()))
                .await;
            return ActionOutcome::Rejected {
                reason: err.to_string(),
            };
        }

        self.notifier
            .notify(Notification::ActionStarted(action.describe()))
            .await;

        match action {
            Action::Create(data) => {
                match self
                    .calendar
                    .create_event(&data.summary, &data.start, &data.end)
                    .await
                {
                    Ok(created) => {
                        info!(event_id = %created.id, summary = %data.summary, "event created");
                        self.notifier
                            .notify(Notification::ActionSucceeded {
                                message: format!("Event created: {}", data.summary),
                                link: created.link.clone(),
                            })
                            .await;
                        ActionOutcome::Created {
                            id: created.id,
                            link: created.link,
                        }
                    }
                    Err(err) => self.report_failure("create", err.to_string()).await,
                }
            }
            Action::Delete(data) => match self.calendar.delete_event(&data.event_id).await {
                Ok(()) => {
                    info!(event_id = %data.event_id, "event deleted");
                    self.notifier
                        .notify(Notification::ActionSucceeded {
                            message: "Event deleted.".to_string(),
                            link: None,
                        })
                        .await;
                    ActionOutcome::Deleted {
                        event_id: data.event_id,
                    }
                }
                Err(err) => self.report_failure("delete", err.to_string()).await,
            },
        }
    }

    async fn report_failure(&self, kind: &str, message: String) -> ActionOutcome {
        error!(kind, error = %message, "calendar action failed");
        self.notifier
            .notify(Notification::ActionFailed(message.clone()))
            .await;
        ActionOutcome::Failed { error: message }
    }
}
