use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::events::queue::ChatEvent;
use crate::handlers::chat::ChatOrchestrator;

/// Processes turns strictly one after another until every sender is dropped.
pub async fn run_event_worker(mut rx: mpsc::Receiver<ChatEvent>, orchestrator: ChatOrchestrator) {
    while let Some(event) = rx.recv().await {
        match event {
            ChatEvent::TurnRequested { text, reply } => {
                let outcome = orchestrator.handle_turn(&text).await;
                if reply.send(outcome).is_err() {
                    debug!("turn requester went away before the outcome was ready");
                }
            }
        }
    }
    info!("chat worker stopped");
}
