use tokio::sync::{mpsc, oneshot};

use crate::handlers::chat::TurnOutcome;

#[derive(Debug)]
pub enum ChatEvent {
    TurnRequested {
        text: String,
        reply: oneshot::Sender<TurnOutcome>,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Queues a turn and waits for it to finish. `None` once the worker is gone.
    pub async fn submit(&self, text: impl Into<String>) -> Option<TurnOutcome> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(ChatEvent::TurnRequested {
                text: text.into(),
                reply,
            })
            .await
            .ok()?;
        done.await.ok()
    }
}
