#![allow(non_snake_case)]

use std::env;
use std::process::ExitCode;

use calendarBot::cli;
use calendarBot::config::{AppConfig, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match env::var("CONFIG_FILE") {
        Ok(path) => match AppConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid config file: {}", e);
                return ExitCode::FAILURE;
            }
        },
        Err(_) => AppConfig::default(),
    };

    let settings = match Settings::from_config(&config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = cli::cli(settings).await {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
