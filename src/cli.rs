use std::sync::Arc;

use clap::{Parser, Subcommand};
use inquire::Text;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, HostOverride, Settings};
use crate::events::queue::EventBus;
use crate::runtime;
use crate::service::context_builder::{ContextBuilder, render_agenda};
use crate::service::notifier::ConsoleNotifier;

#[derive(Parser)]
#[command(about = "Manage your calendar by chatting with a language model")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat; an empty line or "exit" quits.
    Chat,
    /// Run a single turn.
    Say { text: String },
    /// Show the upcoming events the model would see.
    Events,
    /// Point the Ollama backend at a different address.
    SetHost { url: String },
    /// Go back to the configured Ollama address.
    ClearHost,
}

pub async fn cli(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let host_override = HostOverride::new(settings.ollama_host_file.clone());
    match cli.command {
        Commands::SetHost { url } => {
            host_override.persist(&url).await?;
            println!("Ollama host set to {}", url.trim());
        }
        Commands::ClearHost => {
            host_override.clear().await?;
            println!("Ollama host reset to {}", settings.ollama_host);
        }
        Commands::Events => {
            let http = runtime::http_client(&settings)?;
            let calendar = runtime::calendar_client(&settings, http)?;
            let events = ContextBuilder::new(calendar).build().await;
            println!("{}", render_agenda(&events));
        }
        Commands::Say { text } => {
            let (bus, worker) = start(&settings)?;
            bus.submit(text).await;
            drop(bus);
            worker.await?;
        }
        Commands::Chat => {
            let (bus, worker) = start(&settings)?;
            println!("Hi! I'm connected to your calendar. What do you have in mind today?");
            loop {
                let line = match Text::new(">").prompt() {
                    Ok(line) => line,
                    Err(_) => break,
                };
                let line = line.trim();
                if line.is_empty() || line.eq_ignore_ascii_case("exit") {
                    break;
                }
                // Blocks until the turn completes, so turns never overlap.
                if bus.submit(line).await.is_none() {
                    break;
                }
            }
            drop(bus);
            worker.await?;
        }
    }
    Ok(())
}

fn start(settings: &Settings) -> Result<(EventBus, JoinHandle<()>), ConfigError> {
    let http = runtime::http_client(settings)?;
    let calendar = runtime::calendar_client(settings, http.clone())?;
    let orchestrator = runtime::build_orchestrator(settings, calendar, Arc::new(ConsoleNotifier), http);
    Ok(runtime::spawn_chat_worker(orchestrator))
}
