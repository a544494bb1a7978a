use std::fmt;

use async_trait::async_trait;

/// Messages shown to the user while a turn runs, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Thinking,
    Reply(String),
    ActionStarted(String),
    ActionSucceeded { message: String, link: Option<String> },
    ActionFailed(String),
    ActionRejected(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Thinking => write!(f, "_Thinking..._"),
            Notification::Reply(text) => write!(f, "{}", text),
            Notification::ActionStarted(description) => write!(f, "_{}..._", description),
            Notification::ActionSucceeded {
                message,
                link: Some(link),
            } => write!(f, "**Done.** {} [View event]({})", message, link),
            Notification::ActionSucceeded { message, link: None } => {
                write!(f, "**Done.** {}", message)
            }
            Notification::ActionFailed(error) => write!(f, "**Calendar error:** {}", error),
            Notification::ActionRejected(reason) => {
                write!(f, "**Error:** the assistant proposed an incomplete action. {}", reason)
            }
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, notification: Notification) {
        println!("{}", notification);
    }
}
