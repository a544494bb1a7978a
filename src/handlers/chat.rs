use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::handlers::action::{ActionExecutor, ExecutionReport};
use crate::models::decision::Decision;
use crate::models::event::{ChatTurn, EventSummary};
use crate::service::backend::BackendRequest;
use crate::service::context_builder::{ContextBuilder, render_agenda};
use crate::service::notifier::{Notification, Notifier};
use crate::service::prompt::build_system_prompt;
use crate::service::selector::{BackendSelector, ExhaustedDiagnostic, Selection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Ignored,
    Completed {
        backend_id: String,
        decision: Decision,
        report: ExecutionReport,
        refreshed_context: Option<Vec<EventSummary>>,
    },
    Blocked {
        message: String,
    },
    Exhausted {
        diagnostic: ExhaustedDiagnostic,
    },
}

pub struct ChatOrchestrator {
    context: ContextBuilder,
    selector: BackendSelector,
    executor: ActionExecutor,
    notifier: Arc<dyn Notifier>,
    timezone: Tz,
}

impl ChatOrchestrator {
    pub fn new(
        context: ContextBuilder,
        selector: BackendSelector,
        executor: ActionExecutor,
        notifier: Arc<dyn Notifier>,
        timezone: Tz,
    ) -> Self {
        Self {
            context,
            selector,
            executor,
            notifier,
            timezone,
        }
    }

    /// Runs one chat turn to completion. Every outcome leaves nothing behind
    /// for the next turn, which starts from a fresh calendar read.
    pub async fn handle_turn(&self, user_text: &str) -> TurnOutcome {
        let text = user_text.trim();
        if text.is_empty() {
            return TurnOutcome::Ignored;
        }
        let span = info_span!("turn", turn_id = %Uuid::new_v4());
        self.run_turn(text).instrument(span).await
    }

    async fn run_turn(&self, text: &str) -> TurnOutcome {
        self.notifier.notify(Notification::Thinking).await;

        let turn = ChatTurn::new(text, self.context.build().await);
        info!(events = turn.calendar_context.len(), "starting turn");
        let system_prompt = build_system_prompt(
            Utc::now(),
            self.timezone,
            &render_agenda(&turn.calendar_context),
        );
        let request = BackendRequest::from_turn(&turn, system_prompt);

        match self.selector.select(&request).await {
            Selection::Decided {
                backend_id,
                decision,
            } => {
                if !decision.response_text.trim().is_empty() {
                    self.notifier
                        .notify(Notification::Reply(decision.response_text.clone()))
                        .await;
                }

                let report = self.executor.execute(decision.proposals.clone()).await;
                info!(
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    "turn finished"
                );
                let refreshed_context = if report.dispatched() {
                    Some(self.context.build().await)
                } else {
                    None
                };

                TurnOutcome::Completed {
                    backend_id,
                    decision,
                    report,
                    refreshed_context,
                }
            }
            Selection::Blocked { message, .. } => {
                self.notifier.notify(Notification::Reply(message.clone())).await;
                TurnOutcome::Blocked { message }
            }
            Selection::Exhausted { diagnostic } => {
                self.notifier
                    .notify(Notification::Reply(diagnostic.to_string()))
                    .await;
                TurnOutcome::Exhausted { diagnostic }
            }
        }
    }
}
